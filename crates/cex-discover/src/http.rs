use async_trait::async_trait;
use cex_core::{DiscoveryError, SeedDiscovery};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{AGENT_ENDPOINT_ENV, DiscoverConfig};

#[derive(Debug, Deserialize)]
struct AgentState {
    master_hostname: String,
}

#[derive(Debug, Deserialize)]
struct Worker {
    hostname: String,
}

#[derive(Debug, Deserialize)]
struct WorkerList {
    #[serde(default)]
    slaves: Vec<Worker>,
}

/// [`SeedDiscovery`] over the agent `/state` and master `/slaves` HTTP endpoints.
pub struct HttpSeedDiscovery {
    client: reqwest::Client,
    config: DiscoverConfig,
}

impl HttpSeedDiscovery {
    pub fn new(config: DiscoverConfig) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DiscoveryError::Request {
                url: String::new(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, DiscoveryError> {
        let request_err = |e: reqwest::Error| DiscoveryError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        };

        debug!(url, "discovery request");
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_err)?
            .text()
            .await
            .map_err(request_err)?;

        parse(url, &body)
    }
}

fn parse<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, DiscoveryError> {
    serde_json::from_str(body).map_err(|e| DiscoveryError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl SeedDiscovery for HttpSeedDiscovery {
    async fn master_hostname(&self) -> Result<String, DiscoveryError> {
        let url = self
            .config
            .state_url()
            .ok_or_else(|| DiscoveryError::MissingEndpoint(AGENT_ENDPOINT_ENV.to_string()))?;
        let state: AgentState = self.fetch(&url).await?;
        Ok(state.master_hostname)
    }

    async fn worker_hostnames(&self, master: &str) -> Result<Vec<String>, DiscoveryError> {
        let url = self.config.workers_url(master);
        let list: WorkerList = self.fetch(&url).await?;
        Ok(list.slaves.into_iter().map(|w| w.hostname).collect())
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    #[test]
    fn parses_agent_state() {
        let body = r#"{"id":"a1","hostname":"worker-3","master_hostname":"master-1","flags":{}}"#;
        let state: AgentState = parse("http://agent/state", body).unwrap();
        assert_eq!(state.master_hostname, "master-1");
    }

    #[test]
    fn parses_worker_list() {
        let body = r#"{"slaves":[{"id":"s1","hostname":"a.local"},{"id":"s2","hostname":"b.local"}]}"#;
        let list: WorkerList = parse("http://m:5050/slaves", body).unwrap();
        let names: Vec<_> = list.slaves.into_iter().map(|w| w.hostname).collect();
        assert_eq!(names, vec!["a.local", "b.local"]);
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let err = parse::<AgentState>("http://agent/state", "<html>").unwrap_err();
        assert!(matches!(err, DiscoveryError::Parse { ref url, .. } if url == "http://agent/state"));
    }

    #[tokio::test]
    async fn missing_endpoint_fails_fast() {
        let d = HttpSeedDiscovery::new(DiscoverConfig::default()).unwrap();
        let err = d.master_hostname().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingEndpoint(_)));
    }

    #[tokio::test]
    async fn fetches_master_from_agent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await.unwrap();
            let body = r#"{"master_hostname":"master-7"}"#;
            let resp = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
        });

        let d = HttpSeedDiscovery::new(DiscoverConfig {
            agent_endpoint: Some(addr.to_string()),
            ..DiscoverConfig::default()
        })
        .unwrap();
        assert_eq!(d.master_hostname().await.unwrap(), "master-7");
    }
}
