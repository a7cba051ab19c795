use std::path::PathBuf;

use cex_core::config::ENV_PREFIX;
use cex_model::RegistryAuth;

/// Process wiring that is not part of [`cex_core::ExecutorConfig`].
#[derive(Debug, Default)]
pub struct AgentSettings {
    /// Directory holding secret files; `secret://` values stay unresolved without it.
    pub secrets_dir: Option<PathBuf>,
    /// Credentials for pulls from a private registry.
    pub registry_auth: Option<RegistryAuth>,
}

impl AgentSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `SECRETS_DIR` and `REGISTRY_{SERVER,USERNAME,PASSWORD}` under the executor prefix.
    ///
    /// Registry auth is set only when all three values are present.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
        };

        let registry_auth = match (
            var("REGISTRY_SERVER"),
            var("REGISTRY_USERNAME"),
            var("REGISTRY_PASSWORD"),
        ) {
            (Some(server), Some(username), Some(password)) => Some(RegistryAuth {
                server,
                username,
                password,
            }),
            _ => None,
        };

        Self {
            secrets_dir: var("SECRETS_DIR").map(PathBuf::from),
            registry_auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment() {
        let s = AgentSettings::from_lookup(lookup(&[]));
        assert!(s.secrets_dir.is_none());
        assert!(s.registry_auth.is_none());
    }

    #[test]
    fn full_registry_auth() {
        let s = AgentSettings::from_lookup(lookup(&[
            ("EXECUTOR_SECRETS_DIR", "/run/secrets"),
            ("EXECUTOR_REGISTRY_SERVER", "registry.local"),
            ("EXECUTOR_REGISTRY_USERNAME", "ci"),
            ("EXECUTOR_REGISTRY_PASSWORD", "hunter2"),
        ]));
        assert_eq!(s.secrets_dir, Some(PathBuf::from("/run/secrets")));
        let auth = s.registry_auth.unwrap();
        assert_eq!(auth.server, "registry.local");
        assert_eq!(auth.username, "ci");
    }

    #[test]
    fn partial_registry_auth_is_ignored() {
        let s = AgentSettings::from_lookup(lookup(&[
            ("EXECUTOR_REGISTRY_SERVER", "registry.local"),
            ("EXECUTOR_REGISTRY_USERNAME", "ci"),
        ]));
        assert!(s.registry_auth.is_none());
    }
}
