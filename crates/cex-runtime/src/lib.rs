mod error;
pub use error::ExecError;

mod secrets;
pub use secrets::{FileSecretResolver, SECRET_PREFIX};

#[cfg(feature = "docker")]
pub mod docker;
