//! Collection definitions

use cms_content::{Delimiters, Format, QuoteStyle};
use serde::{Deserialize, Serialize};

use super::i18n::I18nSetting;

/// Identifier fields tried, in order, when none is configured
const IDENTIFIER_FIELDS: [&str; 3] = ["title", "name", "label"];

/// Front-matter delimiter: one marker used for both ends, or a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelimiterSetting {
    Marker(String),
    Pair([String; 2]),
}

impl DelimiterSetting {
    pub fn to_delimiters(&self) -> Delimiters {
        match self {
            Self::Marker(marker) => Delimiters::symmetric(marker.clone()),
            Self::Pair([start, end]) => Delimiters::new(start.clone(), end.clone()),
        }
    }
}

/// One file of a file collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionFile {
    /// Entry slug of this file
    pub name: String,
    /// Repository path of the default-locale file
    pub file: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// A group of entries sharing a location and layout.
///
/// A folder collection (`folder`) holds one entry per file or locale group;
/// a file collection (`files`) lists its entries explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    pub name: String,
    pub label: Option<String>,
    pub folder: Option<String>,
    pub files: Vec<CollectionFile>,
    /// Entry path template below `folder`, without extension
    pub path: Option<String>,
    pub extension: Option<String>,
    pub format: Option<Format>,
    pub frontmatter_delimiter: Option<DelimiterSetting>,
    pub yaml_quote: QuoteStyle,
    pub media_folder: Option<String>,
    pub identifier_field: Option<String>,
    /// Slug template for new entries
    pub slug: Option<String>,
    /// Treat `_index` files as entries
    pub index_file: bool,
    pub i18n: I18nSetting,
}

impl Collection {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    pub fn file(&self, name: &str) -> Option<&CollectionFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Entry file extension for folder collections
    pub fn entry_extension(&self) -> String {
        if let Some(extension) = &self.extension {
            return extension.trim_start_matches('.').to_string();
        }
        match self.format {
            Some(Format::Yaml) => "yml",
            Some(Format::Toml) => "toml",
            Some(Format::Json) => "json",
            _ => "md",
        }
        .to_string()
    }

    pub fn delimiters(&self) -> Option<Delimiters> {
        self.frontmatter_delimiter
            .as_ref()
            .map(DelimiterSetting::to_delimiters)
    }

    /// Content fields that may name an entry, in priority order
    pub fn identifier_fields(&self) -> Vec<&str> {
        match &self.identifier_field {
            Some(field) => vec![field.as_str()],
            None => IDENTIFIER_FIELDS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_format() {
        let mut collection = Collection {
            format: Some(Format::Toml),
            ..Collection::default()
        };
        assert_eq!(collection.entry_extension(), "toml");
        collection.extension = Some(".markdown".into());
        assert_eq!(collection.entry_extension(), "markdown");
        assert_eq!(Collection::default().entry_extension(), "md");
    }

    #[test]
    fn delimiter_setting_forms() {
        let single: DelimiterSetting = serde_json::from_str(r#""~~~""#).unwrap();
        assert_eq!(single.to_delimiters(), Delimiters::symmetric("~~~"));
        let pair: DelimiterSetting = serde_json::from_str(r#"["<!--", "-->"]"#).unwrap();
        assert_eq!(pair.to_delimiters(), Delimiters::new("<!--", "-->"));
    }

    #[test]
    fn identifier_fields_default_order() {
        assert_eq!(
            Collection::default().identifier_fields(),
            vec!["title", "name", "label"]
        );
    }
}
