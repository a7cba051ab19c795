use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{
    error::{LoggerError, LoggerResult},
    object::{LoggerFormat, LoggerLevel, LoggerTimeZone},
};

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Output format.
    pub format: LoggerFormat,
    /// Log level filter expression (e.g., "info", "cex_core=debug,info").
    pub level: LoggerLevel,
    /// Timezone for timestamps.
    pub tz: LoggerTimeZone,
    /// Whether to include module/target names in log output.
    pub with_targets: bool,
    /// Whether to use colored output.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Color is used only when enabled in config AND stderr is a terminal.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stderr().is_terminal()
    }

    /// Read overrides from process environment variables named `{prefix}LOG_FORMAT`,
    /// `{prefix}LOG_LEVEL`, `{prefix}LOG_TZ` and `{prefix}LOG_COLOR`.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env(prefix: &str) -> LoggerResult<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Same as [`LoggerConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> LoggerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = |name: &str| lookup(&format!("{prefix}{name}"));

        if let Some(v) = var("LOG_FORMAT") {
            cfg.format = v.parse()?;
        }
        if let Some(v) = var("LOG_LEVEL") {
            cfg.level = v.parse()?;
        }
        if let Some(v) = var("LOG_TZ") {
            cfg.tz = v.parse()?;
        }
        if let Some(v) = var("LOG_COLOR") {
            cfg.use_color = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(LoggerError::InvalidValue {
                        key: format!("{prefix}LOG_COLOR"),
                        value: v,
                    });
                }
            };
        }
        Ok(cfg)
    }
}
