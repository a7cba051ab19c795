use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{op} failed: {reason}")]
    Command { op: &'static str, reason: String },

    #[error("container not found: {0}")]
    NotFound(String),

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("unexpected runtime output: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn command(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Command {
            op,
            reason: reason.into(),
        }
    }
}
