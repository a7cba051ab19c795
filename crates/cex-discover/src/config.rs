use std::time::Duration;

/// Environment variable holding the local agent's `host:port`.
pub const AGENT_ENDPOINT_ENV: &str = "AGENT_ENDPOINT";

#[derive(Debug, Clone)]
pub struct DiscoverConfig {
    /// Local agent address, `host:port` or a full URL.
    pub agent_endpoint: Option<String>,
    /// Port of the master's HTTP API.
    pub master_port: u16,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            agent_endpoint: None,
            master_port: 5050,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl DiscoverConfig {
    /// Defaults with the agent endpoint taken from [`AGENT_ENDPOINT_ENV`].
    pub fn from_env() -> Self {
        Self {
            agent_endpoint: std::env::var(AGENT_ENDPOINT_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty()),
            ..Self::default()
        }
    }

    pub(crate) fn state_url(&self) -> Option<String> {
        self.agent_endpoint
            .as_deref()
            .map(|ep| format!("{}/state", with_scheme(ep.trim().trim_end_matches('/'))))
    }

    pub(crate) fn workers_url(&self, master: &str) -> String {
        format!("http://{master}:{}/slaves", self.master_port)
    }
}

fn with_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}
