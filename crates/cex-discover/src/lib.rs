//! HTTP peer-seed discovery against a cluster agent and its master.
mod config;
pub use config::{AGENT_ENDPOINT_ENV, DiscoverConfig};

mod http;
pub use http::HttpSeedDiscovery;
