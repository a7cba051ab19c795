//! Executor configuration.
//!
//! Durations are expressed in milliseconds both in serde and in the environment.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of every environment variable read by [`ExecutorConfig::from_env`].
pub const ENV_PREFIX: &str = "EXECUTOR_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Interval between container liveness polls.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Time the runtime gives a container to stop before killing it.
    #[serde(with = "millis")]
    pub kill_timeout: Duration,
    /// Extra client-side wait on top of `kill_timeout` before a stop call is abandoned.
    #[serde(with = "millis")]
    pub stop_slack: Duration,
    /// How far back the diagnostic log capture reaches.
    #[serde(with = "millis")]
    pub logs_since: Duration,
    /// Pause between sending the terminal status and stopping the driver.
    #[serde(with = "millis")]
    pub status_grace: Duration,
    /// Relay container output as structured records while the task runs.
    pub relay_logs: bool,
    /// Mirror relayed output to the console sink and skip the capture on kill.
    pub container_logs_stdout: bool,
    /// Container labels attached to every relayed record.
    pub relay_labels: Vec<String>,
    /// Apply the task's CPU allocation as a hard limit even if the task did not ask for it.
    pub force_cpu_limit: bool,
    /// Apply the task's memory allocation as a hard limit even if the task did not ask for it.
    pub force_memory_limit: bool,
    /// Inject discovered peer seeds into the container environment.
    pub seed_discovery: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            kill_timeout: Duration::from_secs(5),
            stop_slack: Duration::from_secs(2),
            logs_since: Duration::from_secs(180),
            status_grace: Duration::from_secs(1),
            relay_logs: false,
            container_logs_stdout: false,
            relay_labels: Vec::new(),
            force_cpu_limit: false,
            force_memory_limit: false,
            seed_discovery: false,
        }
    }
}

impl ExecutorConfig {
    /// Build from `EXECUTOR_*` process environment variables on top of defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ExecutorConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let env = EnvReader { lookup: &lookup };

        env.millis("POLL_INTERVAL_MS", &mut cfg.poll_interval)?;
        env.millis("KILL_TIMEOUT_MS", &mut cfg.kill_timeout)?;
        env.millis("STOP_SLACK_MS", &mut cfg.stop_slack)?;
        env.millis("LOGS_SINCE_MS", &mut cfg.logs_since)?;
        env.millis("STATUS_GRACE_MS", &mut cfg.status_grace)?;
        env.flag("RELAY_LOGS", &mut cfg.relay_logs)?;
        env.flag("CONTAINER_LOGS_STDOUT", &mut cfg.container_logs_stdout)?;
        env.flag("FORCE_CPU_LIMIT", &mut cfg.force_cpu_limit)?;
        env.flag("FORCE_MEMORY_LIMIT", &mut cfg.force_memory_limit)?;
        env.flag("SEED_DISCOVERY", &mut cfg.seed_discovery)?;
        if let Some(raw) = env.get("RELAY_LABELS") {
            cfg.relay_labels = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero("poll_interval"));
        }
        Ok(())
    }

    /// Upper bound on how long a stop call may take before the controller moves on.
    pub fn stop_deadline(&self) -> Duration {
        self.kill_timeout + self.stop_slack
    }
}

struct EnvReader<'a, F> {
    lookup: &'a F,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{name}"))
    }

    fn invalid(name: &str, value: String) -> ConfigError {
        ConfigError::Invalid {
            key: format!("{ENV_PREFIX}{name}"),
            value,
        }
    }

    fn millis(&self, name: &str, out: &mut Duration) -> Result<(), ConfigError> {
        if let Some(raw) = self.get(name) {
            let ms = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| Self::invalid(name, raw.clone()))?;
            *out = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn flag(&self, name: &str, out: &mut bool) -> Result<(), ConfigError> {
        if let Some(raw) = self.get(name) {
            let flag = raw
                .parse::<cex_model::Flag>()
                .map_err(|_| Self::invalid(name, raw.clone()))?;
            *out = flag.is_enabled();
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
