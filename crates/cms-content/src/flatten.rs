//! Flattened key paths over generic content trees
//!
//! Nested content is addressed by a single dotted key: `a.b.0.c` names the
//! `c` field of the first element of list `b` inside map `a`.
//!
//! # Key Syntax
//!
//! - Segments are separated by `.`
//! - A segment made only of ASCII digits is a list index
//! - Inside a map key, `.` and `\` are escaped as `\.` and `\\`
//! - A map key that is empty or made only of digits is prefixed with `\`,
//!   so `tags.0` is a list index and `codes.\0` is the map key `"0"`
//!
//! Empty lists and maps are kept as leaf values, which makes
//! `unflatten(flatten(v)) == v` for every map of scalars, lists and maps.
//!
//! # Examples
//!
//! ```
//! use cms_content::flatten::{flatten, unflatten};
//! use serde_json::json;
//!
//! let tree = json!({"a": 1, "b": {"c": [2, {"d": 3}]}});
//! let flat = flatten(tree.as_object().unwrap());
//! assert_eq!(serde_json::Value::Object(flat.clone()), json!({"a": 1, "b.c.0": 2, "b.c.1.d": 3}));
//! assert_eq!(serde_json::Value::Object(unflatten(&flat).unwrap()), tree);
//! ```

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A segment of a flattened key - either a map key or a list index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Escape a map key so it reads back as the same key.
///
/// ```
/// use cms_content::flatten::escape_segment;
///
/// assert_eq!(escape_segment("title"), "title");
/// assert_eq!(escape_segment("a.b"), "a\\.b");
/// assert_eq!(escape_segment("42"), "\\42");
/// ```
pub fn escape_segment(key: &str) -> String {
    if key.is_empty() || key.bytes().all(|b| b.is_ascii_digit()) {
        return format!("\\{key}");
    }
    key.replace('\\', "\\\\").replace('.', "\\.")
}

/// Join segments into a flattened key
pub fn format_key(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            PathSegment::Key(key) => escape_segment(key),
            PathSegment::Index(idx) => idx.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse a flattened key into segments.
///
/// ```
/// use cms_content::flatten::{parse_key, PathSegment};
///
/// assert_eq!(parse_key("items.0.name").unwrap(), vec![
///     PathSegment::Key("items".to_string()),
///     PathSegment::Index(0),
///     PathSegment::Key("name".to_string()),
/// ]);
/// ```
pub fn parse_key(key: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut literal = false;
    let mut chars = key.chars().peekable();

    let finish = |current: &mut String, literal: &mut bool| -> Result<PathSegment> {
        let text = std::mem::take(current);
        let was_literal = std::mem::replace(literal, false);
        if !was_literal && text.is_empty() {
            return Err(Error::InvalidKey {
                key: key.to_string(),
                reason: "empty segment".to_string(),
            });
        }
        if !was_literal && text.bytes().all(|b| b.is_ascii_digit()) {
            let index = text.parse::<usize>().map_err(|e| Error::InvalidKey {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(PathSegment::Index(index));
        }
        Ok(PathSegment::Key(text))
    };

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                literal = true;
                if let Some(&next) = chars.peek()
                    && (next == '.' || next == '\\')
                {
                    current.push(next);
                    chars.next();
                }
            }
            '.' => segments.push(finish(&mut current, &mut literal)?),
            _ => current.push(ch),
        }
    }
    segments.push(finish(&mut current, &mut literal)?);

    Ok(segments)
}

/// Flatten a map into dotted keys, in document order
pub fn flatten(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        flatten_into(escape_segment(key), value, &mut out);
    }
    out
}

fn flatten_into(prefix: String, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(format!("{prefix}.{}", escape_segment(key)), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                flatten_into(format!("{prefix}.{idx}"), child, out);
            }
        }
        leaf => {
            out.insert(prefix, leaf.clone());
        }
    }
}

/// Rebuild a nested map from dotted keys.
///
/// Missing list positions are filled with nulls. A later key that needs a
/// different container type at an existing position replaces it.
pub fn unflatten(flat: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut root = Value::Object(Map::new());
    for (key, value) in flat {
        let segments = parse_key(key)?;
        if matches!(segments.first(), Some(PathSegment::Index(_))) {
            return Err(Error::InvalidKey {
                key: key.clone(),
                reason: "list index at the top level".to_string(),
            });
        }
        insert_at(&mut root, &segments, value.clone());
    }
    match root {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn insert_at(node: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    let child = match first {
        PathSegment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else { return };
            map.entry(key.clone()).or_insert(Value::Null)
        }
        PathSegment::Index(idx) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            let Value::Array(items) = node else { return };
            if items.len() <= *idx {
                items.resize(*idx + 1, Value::Null);
            }
            &mut items[*idx]
        }
    };

    insert_at(child, rest, value);
}

/// Get a value at the given path from a tree.
///
/// Returns `None` if the path doesn't exist.
pub fn get_at_path<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value);
    };

    let next_value = match first {
        PathSegment::Key(key) => value.get(key)?,
        PathSegment::Index(idx) => value.get(*idx)?,
    };

    get_at_path(next_value, rest)
}
