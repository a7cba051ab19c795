use cex_model::{ContainerId, ModelError};
use thiserror::Error;

use crate::{runtime::RuntimeError, secrets::SecretError};

/// Launch-fatal failures. Each one ends the task with a `Failed` status.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid task: {0}")]
    InvalidTask(#[from] ModelError),

    #[error("failed to pull image {image}: {source}")]
    ImagePull {
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to resolve secrets: {0}")]
    Secrets(#[from] SecretError),

    #[error("failed to create container: {0}")]
    Create(#[source] RuntimeError),

    #[error("failed to start container {container}: {source}")]
    Start {
        container: ContainerId,
        #[source]
        source: RuntimeError,
    },
}
