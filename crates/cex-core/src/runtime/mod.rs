//! Container runtime gateway abstraction.
//!
//! The controller only talks to the container engine through [`ContainerRuntime`];
//! concrete engines (docker CLI, API clients, test doubles) implement it.
mod error;
pub use error::RuntimeError;

use std::{fmt, time::Duration};

use async_trait::async_trait;
use cex_model::{ContainerConfig, ContainerId, ContainerState, RegistryAuth};
use tokio::io::AsyncRead;

/// Boxed byte stream produced by the runtime.
pub type LogReader = Box<dyn AsyncRead + Send + Unpin>;

/// Separate stdout and stderr streams of one container.
pub struct LogStreams {
    pub stdout: LogReader,
    pub stderr: LogReader,
}

impl fmt::Debug for LogStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogStreams(stdout, stderr)")
    }
}

/// Operations the controller needs from a container engine.
///
/// All calls are keyed by [`ContainerId`] once the container exists.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Runtime name used in logs.
    fn name(&self) -> &'static str;

    /// Returns `true` if `image` is present locally.
    async fn image_present(&self, image: &str) -> Result<bool, RuntimeError>;

    /// Pull `image`, authenticating with `auth` when given.
    async fn pull_image(&self, image: &str, auth: Option<&RegistryAuth>)
    -> Result<(), RuntimeError>;

    async fn create_container(&self, config: &ContainerConfig)
    -> Result<ContainerId, RuntimeError>;

    async fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError>;

    /// Ask the container to stop, escalating to a hard kill after `timeout`.
    async fn stop_container(&self, id: &ContainerId, timeout: Duration)
    -> Result<(), RuntimeError>;

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerState, RuntimeError>;

    /// Open the container's log streams.
    ///
    /// `since_epoch` limits output to lines written after that unix timestamp.
    /// With `follow`, the streams stay open until the container exits.
    async fn logs(
        &self,
        id: &ContainerId,
        since_epoch: Option<i64>,
        follow: bool,
    ) -> Result<LogStreams, RuntimeError>;
}
