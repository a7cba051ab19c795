use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Boolean switch with explicit enable/disable semantics.
///
/// Also the parser for truthy/falsy strings coming from labels and environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flag(bool);

impl Flag {
    pub const fn enabled() -> Self {
        Self(true)
    }

    pub const fn disabled() -> Self {
        Self(false)
    }

    pub const fn is_enabled(&self) -> bool {
        self.0
    }

    pub const fn is_disabled(&self) -> bool {
        !self.0
    }

    /// Parse `raw`, falling back to `default` when it is absent or not a recognized boolean.
    pub fn parse_or(raw: Option<&str>, default: bool) -> Self {
        raw.and_then(|s| s.parse::<Flag>().ok())
            .unwrap_or(Self(default))
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FromStr for Flag {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "yes" | "y" | "on" => Ok(Self(true)),
            "0" | "f" | "false" | "no" | "n" | "off" => Ok(Self(false)),
            _ => Err(ModelError::InvalidFlag(s.to_string())),
        }
    }
}

impl From<bool> for Flag {
    fn from(b: bool) -> Self {
        Self(b)
    }
}

impl From<Flag> for bool {
    fn from(f: Flag) -> Self {
        f.0
    }
}

#[cfg(test)]
mod tests {
    use super::Flag;

    #[test]
    fn default_is_disabled() {
        assert!(Flag::default().is_disabled());
    }

    #[test]
    fn parses_truthy_and_falsy_case_insensitive() {
        for s in ["1", "t", "TRUE", "True", "yes", "On"] {
            assert!(s.parse::<Flag>().unwrap().is_enabled(), "{s}");
        }
        for s in ["0", "f", "FALSE", "no", "off", " false "] {
            assert!(s.parse::<Flag>().unwrap().is_disabled(), "{s}");
        }
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "maybe", "2", "enabled"] {
            assert!(s.parse::<Flag>().is_err(), "{s}");
        }
    }

    #[test]
    fn parse_or_uses_default_for_missing_and_garbage() {
        assert!(Flag::parse_or(None, true).is_enabled());
        assert!(Flag::parse_or(Some("banana"), true).is_enabled());
        assert!(Flag::parse_or(Some("false"), true).is_disabled());
        assert!(Flag::parse_or(None, false).is_disabled());
    }

    #[test]
    fn serde_is_plain_bool() {
        let json = serde_json::to_string(&Flag::enabled()).unwrap();
        assert_eq!(json, "true");
        let back: Flag = serde_json::from_str("false").unwrap();
        assert!(back.is_disabled());
    }
}
