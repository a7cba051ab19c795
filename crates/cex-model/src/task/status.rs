use std::fmt;

use serde::{Deserialize, Serialize};

/// Task state as reported to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Accepted, nothing started yet.
    Starting,
    /// Acknowledged; sent once, optimistically, before the container is confirmed started.
    Running,
    /// Container exited cleanly.
    Finished,
    /// Container was stopped on request and did not exit cleanly.
    Killed,
    /// Launch or monitoring failed.
    Failed,
    /// Task state can no longer be determined.
    Lost,
}

impl TaskStatus {
    /// Returns `true` for statuses that end the task's observable lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Killed | TaskStatus::Failed | TaskStatus::Lost
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Starting => "starting",
            TaskStatus::Running => "running",
            TaskStatus::Finished => "finished",
            TaskStatus::Killed => "killed",
            TaskStatus::Failed => "failed",
            TaskStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
