//! Common model-level constants.
//!
//! Well-known label and environment keys shared by the controller and its collaborators.

/// Label key that enables or disables peer-seed discovery for a single container.
///
/// Parsed with [`crate::Flag::parse_or`]; absent or unparseable values count as enabled.
pub const LABEL_DISCOVER: &str = "discover";

/// Environment variable injected into the container with the comma separated list of peer seeds.
pub const DISCOVERY_SEEDS_ENV: &str = "DISCOVERY_SEEDS";
