//! Best-effort peer seed discovery.
//!
//! Two chained lookups: the local agent's master, then the master's worker list.
//! Any failure yields no seeds and a warning; launch never aborts because of it.
use async_trait::async_trait;
use cex_model::{DISCOVERY_SEEDS_ENV, KeyValue};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("agent endpoint is not configured: {0}")]
    MissingEndpoint(String),

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("unparseable response from {url}: {reason}")]
    Parse { url: String, reason: String },
}

#[async_trait]
pub trait SeedDiscovery: Send + Sync + 'static {
    /// Hostname of the master the local agent is registered with.
    async fn master_hostname(&self) -> Result<String, DiscoveryError>;

    /// Hostnames of all workers known to `master`.
    async fn worker_hostnames(&self, master: &str) -> Result<Vec<String>, DiscoveryError>;
}

/// Run both lookups and build the seeds environment entry.
///
/// Returns `None` (after logging a warning) when either lookup fails.
pub async fn discover_seeds(discovery: &dyn SeedDiscovery) -> Option<KeyValue> {
    let master = match discovery.master_hostname().await {
        Ok(master) => master,
        Err(e) => {
            warn!(error = %e, "seed discovery skipped: cannot resolve master");
            return None;
        }
    };

    let workers = match discovery.worker_hostnames(&master).await {
        Ok(workers) => workers,
        Err(e) => {
            warn!(master = %master, error = %e, "seed discovery skipped: cannot list workers");
            return None;
        }
    };

    debug!(master = %master, seeds = workers.len(), "discovered peer seeds");
    Some(KeyValue::new(DISCOVERY_SEEDS_ENV, workers.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDiscovery;

    #[tokio::test]
    async fn joins_worker_hostnames() {
        let d = MockDiscovery::ok("master-1", &["a.local", "b.local"]);
        let kv = discover_seeds(&d).await.unwrap();

        assert_eq!(kv.key(), DISCOVERY_SEEDS_ENV);
        assert_eq!(kv.value(), "a.local,b.local");
        assert_eq!(d.worker_calls(), vec!["master-1".to_string()]);
    }

    #[tokio::test]
    async fn master_failure_yields_nothing_and_skips_workers() {
        let d = MockDiscovery::master_fails();
        assert!(discover_seeds(&d).await.is_none());
        assert!(d.worker_calls().is_empty());
    }

    #[tokio::test]
    async fn worker_failure_yields_nothing() {
        let d = MockDiscovery::workers_fail("master-1");
        assert!(discover_seeds(&d).await.is_none());
    }
}
