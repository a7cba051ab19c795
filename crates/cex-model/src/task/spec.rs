use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Env, Flag, Labels, ModelError, ModelResult, TaskId};

/// Launch request for a single containerized task.
///
/// Immutable once launch begins: the controller only reads from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Orchestrator-assigned identity.
    pub id: TaskId,
    /// Human-readable task name, used in logs only.
    #[serde(default)]
    pub name: String,
    /// Container image reference (e.g. `"nginx:latest"`).
    pub image: String,
    /// Command passed after the image; empty keeps the image default.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Environment before secret resolution.
    #[serde(default, skip_serializing_if = "Env::is_empty")]
    pub env: Env,
    /// Labels attached to the container.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    /// Resources allocated by the orchestrator.
    #[serde(default)]
    pub resources: Resources,
    /// Pull the image even if it is already present locally.
    #[serde(default)]
    pub force_pull: Flag,
}

impl TaskSpec {
    /// Minimal spec with the given id and image.
    pub fn new(id: impl Into<TaskId>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            image: image.into(),
            command: Vec::new(),
            env: Env::new(),
            labels: Labels::new(),
            resources: Resources::default(),
            force_pull: Flag::disabled(),
        }
    }

    /// Rules:
    /// - `id` is not blank;
    /// - `image` is not blank.
    pub fn validate(&self) -> ModelResult<()> {
        if self.id.is_empty() {
            return Err(ModelError::InvalidTask("task id is empty".into()));
        }
        if self.image.trim().is_empty() {
            return Err(ModelError::InvalidTask(format!(
                "task {} has an empty image",
                self.id
            )));
        }
        Ok(())
    }

    /// Runtime-side container name derived from the task id.
    ///
    /// Characters outside `[A-Za-z0-9_.-]` are replaced with `-`.
    pub fn container_name(&self) -> String {
        let sanitized: String = self
            .id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        format!("task-{sanitized}")
    }
}

impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TaskSpec(id='{}', image='{}', command={}, env={}, labels={})",
            self.id,
            self.image,
            self.command.len(),
            self.env.len(),
            self.labels.len(),
        )
    }
}

/// Resources allocated to a task and whether the task asks for them to be enforced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    /// CPU share, in cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,
    /// Memory in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    /// Enforce `cpus` as a hard runtime limit.
    #[serde(default)]
    pub limit_cpu: Flag,
    /// Enforce `memory_mb` as a hard runtime limit.
    #[serde(default)]
    pub limit_memory: Flag,
}

/// Registry credentials used for image pulls.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryAuth {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
