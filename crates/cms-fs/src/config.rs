//! Format-agnostic configuration loading

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Loads typed configuration from TOML, JSON or YAML files.
///
/// The format comes from the file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file.
    ///
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.parse(&content, &extension, path)
    }

    /// Parse configuration text of the format named by `extension`
    pub fn load_str<T: DeserializeOwned>(&self, content: &str, extension: &str) -> Result<T> {
        self.parse(content, &extension.to_lowercase(), Path::new("<inline>"))
    }

    fn parse<T: DeserializeOwned>(&self, content: &str, extension: &str, path: &Path) -> Result<T> {
        let parse_error = |format: &str, message: String| Error::ConfigParse {
            path: path.to_path_buf(),
            format: format.into(),
            message,
        };

        match extension {
            "toml" => toml::from_str(content).map_err(|e| parse_error("TOML", e.to_string())),
            "json" => serde_json::from_str(content).map_err(|e| parse_error("JSON", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(content).map_err(|e| parse_error("YAML", e.to_string()))
            }
            _ => Err(Error::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }
}
