use std::{fmt, time::Duration};

use tracing::trace;

use crate::ExecError;

/// How the `docker` CLI is invoked.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// CLI binary, looked up in `PATH` when not absolute.
    pub binary: String,
    /// Daemon address exported as `DOCKER_HOST`; `None` keeps the CLI default.
    pub host: Option<String>,
    /// Upper bound for short calls (inspect, create, start, logs snapshot).
    pub command_timeout: Duration,
    /// Upper bound for a pull, login included.
    pub pull_timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".into(),
            host: None,
            command_timeout: Duration::from_secs(30),
            pull_timeout: Duration::from_secs(600),
        }
    }
}

impl DockerConfig {
    /// Defaults overridden by `DOCKER_BIN` and `DOCKER_HOST` when set.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(bin) = std::env::var("DOCKER_BIN") {
            if !bin.trim().is_empty() {
                cfg.binary = bin;
            }
        }
        cfg.host = std::env::var("DOCKER_HOST").ok().filter(|h| !h.trim().is_empty());
        cfg
    }

    /// Rules:
    /// - `binary` is not blank;
    /// - both timeouts are non-zero.
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.binary.trim().is_empty() {
            return Err(ExecError::InvalidConfig("docker binary is empty".into()));
        }
        if self.command_timeout.is_zero() || self.pull_timeout.is_zero() {
            return Err(ExecError::InvalidConfig("docker timeouts must be non-zero".into()));
        }
        Ok(())
    }

    pub fn trace_state(&self) {
        trace!(
            binary = %self.binary,
            host = ?self.host,
            command_timeout_ms = self.command_timeout.as_millis() as u64,
            pull_timeout_ms = self.pull_timeout.as_millis() as u64,
            "docker config resolved"
        );
    }
}

impl fmt::Display for DockerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DockerConfig(binary='{}', host={:?}, command_timeout={:?}, pull_timeout={:?})",
            self.binary, self.host, self.command_timeout, self.pull_timeout,
        )
    }
}
