use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Flag, LABEL_DISCOVER};

/// Container labels, ordered by key.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(pub BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Insert or overwrite a label. Returns `self` for chaining.
    pub fn insert<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), val.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keep only the labels whose key appears in `keys`.
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> Labels {
        Labels(
            keys.iter()
                .filter_map(|k| {
                    let k = k.as_ref();
                    self.0.get(k).map(|v| (k.to_string(), v.clone()))
                })
                .collect(),
        )
    }

    /// Whether peer-seed discovery is allowed for this container.
    ///
    /// Reads [`LABEL_DISCOVER`]; absent or unparseable means enabled.
    pub fn discovery_enabled(&self) -> bool {
        Flag::parse_or(self.get(LABEL_DISCOVER), true).is_enabled()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Labels(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
