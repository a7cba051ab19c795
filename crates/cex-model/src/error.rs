use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid boolean flag: {0}")]
    InvalidFlag(String),

    #[error("invalid task spec: {0}")]
    InvalidTask(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
