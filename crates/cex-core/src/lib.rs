//! Task lifecycle controller for a single-container executor.
//!
//! The [`Controller`] receives launch/kill commands from an orchestrator driver,
//! drives a [`ContainerRuntime`], watches the container in the background, relays
//! its logs, and reports exactly one terminal [`cex_model::TaskStatus`] per task.
pub mod config;
pub mod controller;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod relay;
pub mod runtime;
pub mod secrets;
pub mod status;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, ExecutorConfig};
pub use controller::{Controller, ControllerBuilder};
pub use discovery::{DiscoveryError, SeedDiscovery, discover_seeds};
pub use driver::{DriverAdapter, DriverCommand, DriverError, ExecutorHandler, OrchestratorDriver};
pub use error::CoreError;
pub use relay::{
    FanoutSink, JsonLinesSink, LogStream, RelayError, RelayRecord, RelaySession, RelaySink,
    TracingSink, capture_logs, relay_stream,
};
pub use runtime::{ContainerRuntime, LogReader, LogStreams, RuntimeError};
pub use secrets::{PlainResolver, SecretError, SecretResolver};
pub use status::StatusReporter;
pub use watch::{WatchOutcome, WatchSession};

pub mod prelude {
    pub use crate::config::ExecutorConfig;
    pub use crate::controller::{Controller, ControllerBuilder};
    pub use crate::driver::{DriverAdapter, DriverCommand, ExecutorHandler, OrchestratorDriver};
    pub use crate::runtime::ContainerRuntime;
    pub use crate::secrets::SecretResolver;
}
