//! Logger bootstrap for the container executor.
//!
//! One call to [`init_logger`] installs the global `tracing` subscriber
//! (text, JSON, or journald) with an env-filter and RFC3339 timestamps.
mod logger;
pub use logger::*;
