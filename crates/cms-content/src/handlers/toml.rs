//! TOML format handler
//!
//! Decoding walks a `toml_edit` document so keys keep their file order;
//! encoding goes through the `toml` serializer and then rewrites every
//! string holding a line break as a single-line basic string, so no
//! rendered line ever comes from string content.

use serde_json::{Map, Value};
use toml_edit::DocumentMut;
use toml_edit::visit_mut::{self, VisitMut};

use crate::error::{Error, Result};
use crate::format::{Format, FormatHandler, QuoteStyle};

/// Handler for TOML files
#[derive(Debug, Default)]
pub struct TomlHandler;

impl TomlHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for TomlHandler {
    fn format(&self) -> Format {
        Format::Toml
    }

    fn decode(&self, source: &str) -> Result<Value> {
        let doc: DocumentMut = source
            .parse()
            .map_err(|e: toml_edit::TomlError| Error::parse("TOML", e.to_string()))?;
        Ok(table_to_json(doc.as_table()))
    }

    fn encode(&self, value: &Value, _quote: QuoteStyle) -> Result<String> {
        let Some(toml::Value::Table(table)) = json_to_toml(value) else {
            return Err(Error::serialize("TOML", "expected a table at the top level"));
        };
        let text =
            toml::to_string(&table).map_err(|e| Error::serialize("TOML", e.to_string()))?;
        let mut doc: DocumentMut = text
            .parse()
            .map_err(|e: toml_edit::TomlError| Error::serialize("TOML", e.to_string()))?;

        let mut rewriter = SingleLineStrings::default();
        rewriter.visit_document_mut(&mut doc);
        if let Some(message) = rewriter.error {
            return Err(Error::serialize("TOML", message));
        }
        Ok(doc.to_string())
    }
}

/// Replaces multi-line string values with escaped basic strings
#[derive(Default)]
struct SingleLineStrings {
    error: Option<String>,
}

impl VisitMut for SingleLineStrings {
    fn visit_value_mut(&mut self, node: &mut toml_edit::Value) {
        if let toml_edit::Value::String(s) = node
            && s.value().contains(['\n', '\r'])
        {
            let decor = s.decor().clone();
            match basic_string(s.value()).parse::<toml_edit::Value>() {
                Ok(mut single) => {
                    *single.decor_mut() = decor;
                    *node = single;
                }
                Err(e) => self.error = Some(e.to_string()),
            }
            return;
        }
        visit_mut::visit_value_mut(self, node);
    }
}

/// Render `text` as a TOML basic string literal
fn basic_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn table_to_json(table: &toml_edit::Table) -> Value {
    let mut map = Map::new();
    for (key, item) in table.iter() {
        map.insert(key.to_string(), item_to_json(item));
    }
    Value::Object(map)
}

fn item_to_json(item: &toml_edit::Item) -> Value {
    match item {
        toml_edit::Item::Value(v) => value_to_json(v),
        toml_edit::Item::Table(t) => table_to_json(t),
        toml_edit::Item::ArrayOfTables(arr) => Value::Array(arr.iter().map(table_to_json).collect()),
        toml_edit::Item::None => Value::Null,
    }
}

fn value_to_json(v: &toml_edit::Value) -> Value {
    match v {
        toml_edit::Value::String(s) => Value::String(s.value().to_string()),
        toml_edit::Value::Integer(i) => Value::Number((*i.value()).into()),
        toml_edit::Value::Float(f) => serde_json::Number::from_f64(*f.value())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml_edit::Value::Boolean(b) => Value::Bool(*b.value()),
        toml_edit::Value::Datetime(d) => Value::String(d.value().to_string()),
        toml_edit::Value::Array(arr) => Value::Array(arr.iter().map(value_to_json).collect()),
        toml_edit::Value::InlineTable(t) => {
            let mut map = Map::new();
            for (key, value) in t.iter() {
                map.insert(key.to_string(), value_to_json(value));
            }
            Value::Object(map)
        }
    }
}

/// TOML has no null: null leaves are dropped
fn json_to_toml(value: &Value) -> Option<toml::Value> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(toml::Value::Boolean(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(toml::Value::Integer(i)),
            None => n.as_f64().map(toml::Value::Float),
        },
        Value::String(s) => Some(toml::Value::String(s.clone())),
        Value::Array(items) => Some(toml::Value::Array(
            items.iter().filter_map(json_to_toml).collect(),
        )),
        Value::Object(map) => {
            let mut table = toml::map::Map::new();
            for (key, value) in map {
                if let Some(value) = json_to_toml(value) {
                    table.insert(key.clone(), value);
                }
            }
            Some(toml::Value::Table(table))
        }
    }
}
