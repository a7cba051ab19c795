use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Ordered list of environment variables handed to a container.
///
/// Later entries win on lookup, so appending is the override mechanism.
/// Serialized as a transparent array of `{key, value}` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Env(pub Vec<KeyValue>);

impl Env {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Keys in insertion order. Used for logging without leaking values.
    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|kv| kv.key()).collect()
    }

    /// Get the value for a key, returning the last matching entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    /// Append a key–value pair; it overrides earlier entries with the same key.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Concatenate two environments, entries from `other` override `self`.
    pub fn merged(&self, other: &Env) -> Env {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        Env(out)
    }

    /// Rebuild the environment by passing every value through `f`.
    ///
    /// Stops at the first error; a partially mapped environment is never returned.
    pub fn try_map_values<F, E>(self, mut f: F) -> Result<Env, E>
    where
        F: FnMut(&str, String) -> Result<String, E>,
    {
        let mut out = Vec::with_capacity(self.0.len());
        for kv in self.0 {
            let (key, value) = kv.into_parts();
            let value = f(&key, value)?;
            out.push(KeyValue::new(key, value));
        }
        Ok(Env(out))
    }
}

impl From<Vec<KeyValue>> for Env {
    fn from(v: Vec<KeyValue>) -> Self {
        Self(v)
    }
}
