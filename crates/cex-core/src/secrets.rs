//! Secret resolution seam.
use async_trait::async_trait;
use cex_model::Env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to decrypt {key}: {reason}")]
    Decrypt { key: String, reason: String },

    #[error("secret backend unavailable: {0}")]
    Backend(String),
}

/// Turns encoded environment values into plaintext.
///
/// Implementations fail closed: any error aborts the whole resolution and no
/// partially resolved environment is returned.
#[async_trait]
pub trait SecretResolver: Send + Sync + 'static {
    async fn resolve(&self, env: Env) -> Result<Env, SecretError>;
}

/// Resolver that returns the environment unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainResolver;

#[async_trait]
impl SecretResolver for PlainResolver {
    async fn resolve(&self, env: Env) -> Result<Env, SecretError> {
        Ok(env)
    }
}
