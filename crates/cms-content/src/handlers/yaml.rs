//! YAML format handler using serde_yaml

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};
use crate::format::{Format, FormatHandler, QuoteStyle};

/// Keys that can be written without quotes
static PLAIN_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").unwrap());

/// Plain keys YAML 1.1 readers would turn into booleans or null
const RESERVED_WORDS: &[&str] = &[
    "true", "false", "yes", "no", "on", "off", "y", "n", "null",
];

/// Handler for YAML files using serde_yaml
#[derive(Debug, Default)]
pub struct YamlHandler;

impl YamlHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for YamlHandler {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn decode(&self, source: &str) -> Result<Value> {
        let yaml_value: YamlValue =
            serde_yaml::from_str(source).map_err(|e| Error::parse("YAML", e.to_string()))?;

        match yaml_to_json(&yaml_value) {
            Value::Null => Ok(Value::Object(Map::new())),
            value @ Value::Object(_) => Ok(value),
            _ => Err(Error::parse("YAML", "expected a mapping at the top level")),
        }
    }

    fn encode(&self, value: &Value, quote: QuoteStyle) -> Result<String> {
        match quote {
            QuoteStyle::Auto => {
                serde_yaml::to_string(value).map_err(|e| Error::serialize("YAML", e.to_string()))
            }
            QuoteStyle::Double | QuoteStyle::Single => {
                let Value::Object(map) = value else {
                    return Err(Error::serialize("YAML", "expected a mapping at the top level"));
                };
                if map.is_empty() {
                    return Ok("{}\n".to_string());
                }
                let mut out = String::new();
                emit_mapping(map, 0, quote, &mut out);
                Ok(out)
            }
        }
    }
}

fn yaml_to_json(value: &YamlValue) -> Value {
    match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        YamlValue::String(s) => Value::String(s.clone()),
        YamlValue::Sequence(items) => Value::Array(items.iter().map(yaml_to_json).collect()),
        YamlValue::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(key_to_string(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn key_to_string(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Null => "null".to_string(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Tagged(tagged) => key_to_string(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn emit_mapping(map: &Map<String, Value>, indent: usize, quote: QuoteStyle, out: &mut String) {
    let pad = " ".repeat(indent);
    for (key, value) in map {
        out.push_str(&pad);
        out.push_str(&format_key(key));
        out.push(':');
        emit_nested(value, indent, quote, out);
    }
}

fn emit_sequence(items: &[Value], indent: usize, quote: QuoteStyle, out: &mut String) {
    let pad = " ".repeat(indent);
    for item in items {
        out.push_str(&pad);
        out.push('-');
        match item {
            Value::Object(map) if !map.is_empty() => {
                // First key shares the line with the dash
                let mut nested = String::new();
                emit_mapping(map, indent + 2, quote, &mut nested);
                out.push(' ');
                out.push_str(&nested[indent + 2..]);
            }
            Value::Array(inner) if !inner.is_empty() => {
                out.push('\n');
                emit_sequence(inner, indent + 2, quote, out);
            }
            scalar => {
                out.push(' ');
                out.push_str(&format_scalar(scalar, quote));
                out.push('\n');
            }
        }
    }
}

fn emit_nested(value: &Value, indent: usize, quote: QuoteStyle, out: &mut String) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            out.push('\n');
            emit_mapping(map, indent + 2, quote, out);
        }
        Value::Array(items) if !items.is_empty() => {
            out.push('\n');
            emit_sequence(items, indent + 2, quote, out);
        }
        scalar => {
            out.push(' ');
            out.push_str(&format_scalar(scalar, quote));
            out.push('\n');
        }
    }
}

fn format_key(key: &str) -> String {
    if PLAIN_KEY.is_match(key) && !RESERVED_WORDS.contains(&key.to_lowercase().as_str()) {
        key.to_string()
    } else {
        double_quoted(key)
    }
}

fn format_scalar(value: &Value, quote: QuoteStyle) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => match quote {
            QuoteStyle::Single if !s.chars().any(char::is_control) => {
                format!("'{}'", s.replace('\'', "''"))
            }
            _ => double_quoted(s),
        },
        Value::Array(_) => "[]".to_string(),
        Value::Object(_) => "{}".to_string(),
    }
}

/// JSON string escaping is a valid YAML double-quoted scalar
fn double_quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}
