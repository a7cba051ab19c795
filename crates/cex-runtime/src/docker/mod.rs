//! [`ContainerRuntime`] backed by the `docker` CLI.
//!
//! Every call spawns one CLI process via `tokio::process::Command`; output is
//! captured and mapped to [`RuntimeError`]. Log streams are the piped stdout and
//! stderr of a `docker logs` child.
mod args;
mod config;
mod state;

pub use config::DockerConfig;

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use cex_core::{ContainerRuntime, LogStreams, RuntimeError};
use cex_model::{ContainerConfig, ContainerId, ContainerState, RegistryAuth};
use tokio::{io::AsyncWriteExt, process::Command, time};
use tracing::{debug, trace, warn};

use crate::ExecError;

/// Captured result of a finished CLI call.
struct CliOutput {
    stdout: String,
    stderr: String,
}

pub struct DockerCli {
    config: DockerConfig,
}

impl DockerCli {
    pub fn new(config: DockerConfig) -> Result<Self, ExecError> {
        config.validate()?;
        config.trace_state();
        Ok(Self { config })
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(args);
        if let Some(host) = &self.config.host {
            cmd.env("DOCKER_HOST", host);
        }
        cmd
    }

    /// Run one CLI call to completion. Non-zero exit becomes `RuntimeError::Command`
    /// carrying the CLI's stderr.
    async fn run(
        &self,
        op: &'static str,
        args: Vec<String>,
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<CliOutput, RuntimeError> {
        trace!(op, binary = %self.config.binary, "running docker command");

        let mut cmd = self.command(&args);
        cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| RuntimeError::command(op, format!("spawn failed: {e}")))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            pipe.shutdown().await?;
        }

        let output = match time::timeout(timeout, child.wait_with_output()).await {
            Ok(res) => res?,
            Err(_) => return Err(RuntimeError::Timeout { op, after: timeout }),
        };

        let out = CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        if output.status.success() {
            return Ok(out);
        }

        let reason = if out.stderr.is_empty() {
            format!("exit status {}", output.status)
        } else {
            out.stderr
        };
        Err(RuntimeError::command(op, reason))
    }
}

fn is_missing(err: &RuntimeError) -> bool {
    matches!(err, RuntimeError::Command { reason, .. } if reason.contains("No such"))
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn image_present(&self, image: &str) -> Result<bool, RuntimeError> {
        match self
            .run("image inspect", args::image_inspect(image), None, self.config.command_timeout)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_missing(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn pull_image(&self, image: &str, auth: Option<&RegistryAuth>) -> Result<(), RuntimeError> {
        if let Some(auth) = auth {
            debug!(server = %auth.server, username = %auth.username, "registry login");
            self.run(
                "login",
                args::login(auth),
                Some(auth.password.as_bytes()),
                self.config.command_timeout,
            )
            .await?;
        }

        self.run("pull", args::pull(image), None, self.config.pull_timeout)
            .await?;
        debug!(image, "image pulled");
        Ok(())
    }

    async fn create_container(&self, config: &ContainerConfig) -> Result<ContainerId, RuntimeError> {
        let out = self
            .run("create", args::create(config), None, self.config.command_timeout)
            .await?;

        let id = out.stdout.trim();
        if id.is_empty() {
            return Err(RuntimeError::Parse("create returned no container id".into()));
        }
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.run("start", args::start(id), None, self.config.command_timeout)
            .await
            .map(|_| ())
    }

    async fn stop_container(&self, id: &ContainerId, timeout: Duration) -> Result<(), RuntimeError> {
        let bound = timeout + self.config.command_timeout;
        self.run("stop", args::stop(id, timeout), None, bound)
            .await
            .map(|_| ())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerState, RuntimeError> {
        match self
            .run("inspect", args::inspect(id), None, self.config.command_timeout)
            .await
        {
            Ok(out) => state::parse_state(&out.stdout),
            Err(e) if is_missing(&e) => Err(RuntimeError::NotFound(id.as_str().to_string())),
            Err(e) => Err(e),
        }
    }

    async fn logs(
        &self,
        id: &ContainerId,
        since_epoch: Option<i64>,
        follow: bool,
    ) -> Result<LogStreams, RuntimeError> {
        let mut cmd = self.command(&args::logs(id, since_epoch, follow));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| RuntimeError::command("logs", format!("spawn failed: {e}")))?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(RuntimeError::command("logs", "child pipes unavailable"));
        };

        let container = id.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!(container = %container, %status, "docker logs exited with failure")
                }
                Ok(_) => trace!(container = %container, "docker logs exited"),
                Err(e) => warn!(container = %container, error = %e, "failed to reap docker logs"),
            }
        });

        Ok(LogStreams {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        })
    }
}
