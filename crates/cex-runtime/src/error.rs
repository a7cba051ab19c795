use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
