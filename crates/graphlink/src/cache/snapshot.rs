//! Serialized cache contents handed from server render to client start.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::CacheError;

/// Name of the browser global carrying the snapshot.
pub const SNAPSHOT_GLOBAL: &str = "__APOLLO__";

/// The normalized cache as plain JSON: `entity id -> { field key -> value }`.
///
/// Entries are kept sorted so the serialized form is stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheSnapshot {
    entities: BTreeMap<String, Map<String, Value>>,
}

impl CacheSnapshot {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(text: &str) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build a snapshot from an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, CacheError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, CacheError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Render a `<script>` element assigning the snapshot to
    /// `window.__APOLLO__`.
    ///
    /// Characters that could end the script element or break the
    /// JavaScript string grammar are escaped as `\uXXXX`; the payload is
    /// still valid JSON and parses back with [`CacheSnapshot::from_json`].
    pub fn to_handoff_script(&self) -> Result<String, CacheError> {
        let json = escape_for_script(&self.to_json()?);
        Ok(format!("<script>window.{SNAPSHOT_GLOBAL}={json};</script>"))
    }

    /// Insert or replace one entity.
    pub fn insert(&mut self, id: impl Into<String>, fields: Map<String, Value>) {
        self.entities.insert(id.into(), fields);
    }

    /// Look up one entity.
    pub fn get(&self, id: &str) -> Option<&Map<String, Value>> {
        self.entities.get(id)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the snapshot holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over `(entity id, fields)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Map<String, Value>)> {
        self.entities.iter()
    }
}

impl IntoIterator for CacheSnapshot {
    type Item = (String, Map<String, Value>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Map<String, Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl FromIterator<(String, Map<String, Value>)> for CacheSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, Map<String, Value>)>>(iter: T) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

fn escape_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}
