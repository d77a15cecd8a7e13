//! Flattened content records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::flatten::{escape_segment, flatten, unflatten};

/// Reserved key holding the body of a front-matter file
pub const BODY_KEY: &str = "body";

/// Flat key/value view of one decoded file.
///
/// Keys follow the syntax of [`crate::flatten`]; values are scalars or empty
/// lists/maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedContent(Map<String, Value>);

impl ParsedContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a nested tree. Non-object trees produce empty content.
    pub fn from_tree(tree: &Value) -> Self {
        match tree {
            Value::Object(map) => Self(flatten(map)),
            _ => Self::default(),
        }
    }

    /// Rebuild the nested tree
    pub fn to_tree(&self) -> Result<Value> {
        Ok(Value::Object(unflatten(&self.0)?))
    }

    pub fn from_flat(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of a top-level field
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(&escape_segment(field)).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn body(&self) -> Option<&str> {
        self.get_str(BODY_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Fields stored under a top-level prefix, with the prefix removed.
    ///
    /// Used for single-file locale maps where `en.title` belongs to `en`.
    pub fn scoped(&self, prefix: &str) -> Self {
        let head = format!("{}.", escape_segment(prefix));
        Self(
            self.0
                .iter()
                .filter_map(|(key, value)| {
                    key.strip_prefix(&head)
                        .map(|rest| (rest.to_string(), value.clone()))
                })
                .collect(),
        )
    }

    /// Inverse of [`ParsedContent::scoped`]
    pub fn prefixed(&self, prefix: &str) -> Self {
        let head = escape_segment(prefix);
        Self(
            self.0
                .iter()
                .map(|(key, value)| (format!("{head}.{key}"), value.clone()))
                .collect(),
        )
    }

    /// Merge another record's keys over this one
    pub fn extend(&mut self, other: ParsedContent) {
        self.0.extend(other.0);
    }
}

impl FromIterator<(String, Value)> for ParsedContent {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
