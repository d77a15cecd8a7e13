//! JSON format handler

use serde_json::Value;

use crate::error::{Error, Result};
use crate::format::{Format, FormatHandler, QuoteStyle};

/// Handler for JSON files
#[derive(Debug, Default)]
pub struct JsonHandler;

impl JsonHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for JsonHandler {
    fn format(&self) -> Format {
        Format::Json
    }

    fn decode(&self, source: &str) -> Result<Value> {
        if source.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        let value: Value =
            serde_json::from_str(source).map_err(|e| Error::parse("JSON", e.to_string()))?;
        if !value.is_object() {
            return Err(Error::parse("JSON", "expected an object at the top level"));
        }
        Ok(value)
    }

    fn encode(&self, value: &Value, _quote: QuoteStyle) -> Result<String> {
        serde_json::to_string_pretty(value).map_err(|e| Error::serialize("JSON", e.to_string()))
    }
}
