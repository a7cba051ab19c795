//! Secret resolution from a directory of mounted secret files.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cex_core::{SecretError, SecretResolver};
use cex_model::Env;
use tracing::debug;

/// Values with this prefix name a secret file instead of carrying plaintext.
pub const SECRET_PREFIX: &str = "secret://";

/// Replaces `secret://<name>` values with the contents of `<dir>/<name>`.
///
/// One trailing newline is stripped from the file. Values without the prefix pass
/// through unchanged. Any unreadable or malformed reference fails the whole
/// environment.
#[derive(Debug, Clone)]
pub struct FileSecretResolver {
    dir: PathBuf,
}

impl FileSecretResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str, name: &str) -> Result<PathBuf, SecretError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && name != "."
            && name != "..";
        if !valid {
            return Err(SecretError::Decrypt {
                key: key.to_string(),
                reason: format!("invalid secret name {name:?}"),
            });
        }
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl SecretResolver for FileSecretResolver {
    async fn resolve(&self, env: Env) -> Result<Env, SecretError> {
        let mut refs = Vec::new();
        for kv in env.iter() {
            if let Some(name) = kv.value().strip_prefix(SECRET_PREFIX) {
                refs.push((kv.key().to_string(), self.path_for(kv.key(), name)?));
            }
        }

        let mut plain = Vec::with_capacity(refs.len());
        for (key, path) in refs {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| SecretError::Decrypt {
                    key: key.clone(),
                    reason: format!("{}: {e}", path.display()),
                })?;
            let value = raw
                .strip_suffix('\n')
                .map(|v| v.strip_suffix('\r').unwrap_or(v))
                .unwrap_or(raw.as_str())
                .to_string();
            debug!(key = %key, "secret resolved");
            plain.push(value);
        }

        let mut plain = plain.into_iter();
        env.try_map_values(|_, value| {
            if value.starts_with(SECRET_PREFIX) {
                plain
                    .next()
                    .ok_or_else(|| SecretError::Backend("secret count mismatch".into()))
            } else {
                Ok(value)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cex-secrets-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn resolves_prefixed_values_only() {
        let dir = scratch_dir("ok");
        std::fs::write(dir.join("db_password"), "s3cr3t\n").unwrap();

        let mut env = Env::new();
        env.push("PORT", "8080");
        env.push("DB_PASSWORD", "secret://db_password");

        let out = FileSecretResolver::new(&dir).resolve(env).await.unwrap();
        assert_eq!(out.get("PORT"), Some("8080"));
        assert_eq!(out.get("DB_PASSWORD"), Some("s3cr3t"));
        assert_eq!(out.keys(), vec!["PORT", "DB_PASSWORD"]);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn missing_file_fails_closed() {
        let dir = scratch_dir("missing");
        let mut env = Env::new();
        env.push("TOKEN", "secret://absent");

        let err = FileSecretResolver::new(&dir).resolve(env).await.unwrap_err();
        assert!(matches!(err, SecretError::Decrypt { ref key, .. } if key == "TOKEN"));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let mut env = Env::new();
        env.push("TOKEN", "secret://../etc/passwd");

        let err = FileSecretResolver::new("/run/secrets").resolve(env).await;
        assert!(matches!(err, Err(SecretError::Decrypt { .. })));
    }
}
