use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Env, Labels};

/// Runtime-assigned container identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, the conventional short form used in logs.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Snapshot returned by a runtime inspect call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerState {
    pub running: bool,
    pub exit_code: i64,
    /// Runtime-specific status string (e.g. `"exited"`).
    #[serde(default)]
    pub status: String,
}

impl ContainerState {
    pub fn running() -> Self {
        Self {
            running: true,
            exit_code: 0,
            status: "running".into(),
        }
    }

    pub fn exited(exit_code: i64) -> Self {
        Self {
            running: false,
            exit_code,
            status: "exited".into(),
        }
    }

    /// `true` only for a stopped container with exit code 0.
    pub fn exited_cleanly(&self) -> bool {
        !self.running && self.exit_code == 0
    }
}

/// Fully resolved configuration handed to the runtime's create call.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    /// Environment after secret resolution.
    pub env: Env,
    pub labels: Labels,
    pub cpus: Option<f64>,
    pub memory_mb: Option<u64>,
}
