//! Format detection and handler trait

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::handlers::{JsonHandler, TomlHandler, YamlHandler};

/// Supported content formats
///
/// The three front-matter variants carry a structured header in the named
/// format followed by an opaque body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Format {
    Yaml,
    Toml,
    Json,
    YamlFrontmatter,
    TomlFrontmatter,
    JsonFrontmatter,
}

impl Format {
    /// Default format for a file extension.
    ///
    /// Markdown-family extensions default to YAML front-matter.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "md" | "markdown" | "mdx" | "html" => Some(Self::YamlFrontmatter),
            _ => None,
        }
    }

    /// Parse a declared format name as written in site configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "frontmatter" | "yaml-frontmatter" => Some(Self::YamlFrontmatter),
            "toml-frontmatter" => Some(Self::TomlFrontmatter),
            "json-frontmatter" => Some(Self::JsonFrontmatter),
            _ => None,
        }
    }

    /// Canonical configuration name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json => "json",
            Self::YamlFrontmatter => "yaml-frontmatter",
            Self::TomlFrontmatter => "toml-frontmatter",
            Self::JsonFrontmatter => "json-frontmatter",
        }
    }

    pub fn is_front_matter(&self) -> bool {
        matches!(
            self,
            Self::YamlFrontmatter | Self::TomlFrontmatter | Self::JsonFrontmatter
        )
    }

    /// The format of the structured part: the whole file, or the header of a
    /// front-matter file.
    pub fn data_format(&self) -> Self {
        match self {
            Self::Yaml | Self::YamlFrontmatter => Self::Yaml,
            Self::Toml | Self::TomlFrontmatter => Self::Toml,
            Self::Json | Self::JsonFrontmatter => Self::Json,
        }
    }

    /// Default header delimiters for front-matter formats
    pub fn default_delimiters(&self) -> Option<Delimiters> {
        match self {
            Self::YamlFrontmatter => Some(Delimiters::new("---", "---")),
            Self::TomlFrontmatter => Some(Delimiters::new("+++", "+++")),
            Self::JsonFrontmatter => Some(Delimiters::new("{", "}")),
            Self::Yaml | Self::Toml | Self::Json => None,
        }
    }

    /// Handler for the structured part of this format
    pub fn handler(&self) -> &'static dyn FormatHandler {
        match self.data_format() {
            Self::Toml => &TomlHandler,
            Self::Json => &JsonHandler,
            _ => &YamlHandler,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

impl TryFrom<String> for Format {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.name().to_string()
    }
}

/// Start and end markers of a front-matter header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Delimiters {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Same marker for start and end, e.g. `~~~`
    pub fn symmetric(marker: impl Into<String>) -> Self {
        let marker = marker.into();
        Self {
            start: marker.clone(),
            end: marker,
        }
    }
}

/// How string scalars are quoted when writing YAML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    /// Quote only where the serializer requires it
    #[default]
    Auto,
    Double,
    Single,
}

/// Trait for format-specific handlers
pub trait FormatHandler: Send + Sync {
    /// Format identifier
    fn format(&self) -> Format;

    /// Parse source into a generic tree
    fn decode(&self, source: &str) -> Result<Value>;

    /// Render a generic tree back to text
    fn encode(&self, value: &Value, quote: QuoteStyle) -> Result<String>;
}
