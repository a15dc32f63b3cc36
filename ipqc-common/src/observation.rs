//! Observation values
//!
//! Every recorded reading is a string leaf. Multi-dimensional parameters
//! nest those leaves under string keys (unit, sample, time slot, field) up
//! to four levels deep. The tree is an explicit sum type so every consumer
//! matches on it instead of probing the JSON shape at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Nested map of observation values
pub type ObservationMap = BTreeMap<String, ObservationValue>;

/// One observation value: a leaf string or a keyed map of values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    /// Operator input (possibly empty)
    Leaf(String),
    /// Keyed sub-values
    Node(ObservationMap),
}

impl Default for ObservationValue {
    fn default() -> Self {
        ObservationValue::Leaf(String::new())
    }
}

impl From<&str> for ObservationValue {
    fn from(value: &str) -> Self {
        ObservationValue::Leaf(value.to_string())
    }
}

impl From<String> for ObservationValue {
    fn from(value: String) -> Self {
        ObservationValue::Leaf(value)
    }
}

impl From<ObservationMap> for ObservationValue {
    fn from(map: ObservationMap) -> Self {
        ObservationValue::Node(map)
    }
}

impl ObservationValue {
    /// Empty leaf
    pub fn empty() -> Self {
        ObservationValue::default()
    }

    /// Node whose keys all map to empty leaves
    pub fn empty_node<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        ObservationValue::Node(
            keys.into_iter()
                .map(|k| (k.into(), ObservationValue::empty()))
                .collect(),
        )
    }

    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            ObservationValue::Leaf(s) => Some(s),
            ObservationValue::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&ObservationMap> {
        match self {
            ObservationValue::Leaf(_) => None,
            ObservationValue::Node(map) => Some(map),
        }
    }

    /// Child value under `key` (None for leaves and missing keys)
    pub fn get(&self, key: &str) -> Option<&ObservationValue> {
        self.as_node().and_then(|map| map.get(key))
    }

    /// Value at a key path, if present
    pub fn get_path(&self, path: &[&str]) -> Option<&ObservationValue> {
        path.iter().try_fold(self, |value, key| value.get(key))
    }

    /// Leaf text at a key path, reading missing or non-leaf entries as ""
    ///
    /// Saved data may predate the current line's shape; renderers read
    /// through this so absent keys show up blank instead of failing.
    pub fn leaf_at(&self, path: &[&str]) -> &str {
        self.get_path(path)
            .and_then(ObservationValue::as_leaf)
            .unwrap_or("")
    }

    /// Copy of this value with the leaf at `path` set to `text`
    ///
    /// Sibling keys are kept. Missing intermediate keys are created and a
    /// leaf standing where a map is needed is replaced by one, matching a
    /// spread-merge of the current map with one changed field. An empty
    /// path replaces the whole value.
    pub fn with_field(&self, path: &[&str], text: impl Into<String>) -> ObservationValue {
        let Some((head, rest)) = path.split_first() else {
            return ObservationValue::Leaf(text.into());
        };

        let mut map = self.as_node().cloned().unwrap_or_default();
        let child = map.remove(*head).unwrap_or_default();
        map.insert((*head).to_string(), child.with_field(rest, text));
        ObservationValue::Node(map)
    }

    /// Every leaf with its key path, in key order
    pub fn leaves(&self) -> Vec<(Vec<String>, &str)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a str)>) {
        match self {
            ObservationValue::Leaf(text) => out.push((prefix.clone(), text.as_str())),
            ObservationValue::Node(map) => {
                for (key, child) in map {
                    prefix.push(key.clone());
                    child.collect_leaves(prefix, out);
                    prefix.pop();
                }
            }
        }
    }

    /// True when every leaf is blank
    pub fn is_blank(&self) -> bool {
        match self {
            ObservationValue::Leaf(text) => text.trim().is_empty(),
            ObservationValue::Node(map) => map.values().all(ObservationValue::is_blank),
        }
    }

    /// Nesting depth (leaf = 0)
    pub fn depth(&self) -> usize {
        match self {
            ObservationValue::Leaf(_) => 0,
            ObservationValue::Node(map) => 1 + map.values().map(|v| v.depth()).max().unwrap_or(0),
        }
    }
}

/// One recorded value keyed by time slot, unit, sample or composite label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSlot {
    pub slot_key: String,
    pub value: ObservationValue,
}

impl ObservationSlot {
    pub fn new(slot_key: impl Into<String>, value: ObservationValue) -> Self {
        Self {
            slot_key: slot_key.into(),
            value,
        }
    }
}
