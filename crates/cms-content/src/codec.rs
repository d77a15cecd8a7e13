//! Decode and encode entry files
//!
//! Format resolution order is: explicitly declared format, then the default
//! for the file extension.

use crate::content::ParsedContent;
use crate::error::{Error, Result};
use crate::format::{Delimiters, Format, QuoteStyle};
use crate::frontmatter;

/// Options for [`decode`]
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// File extension without the dot
    pub extension: Option<String>,
    /// Format declared by configuration
    pub format: Option<Format>,
    /// Custom front-matter delimiters
    pub delimiters: Option<Delimiters>,
}

impl DecodeOptions {
    pub fn for_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: Option<Format>) -> Self {
        self.format = format;
        self
    }

    pub fn with_delimiters(mut self, delimiters: Option<Delimiters>) -> Self {
        self.delimiters = delimiters;
        self
    }
}

/// Options for [`encode`]
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub format: Format,
    pub delimiters: Option<Delimiters>,
    pub quote: QuoteStyle,
}

impl EncodeOptions {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            delimiters: None,
            quote: QuoteStyle::default(),
        }
    }
}

/// Resolve the effective format of a file
pub fn resolve_format(declared: Option<Format>, extension: Option<&str>) -> Result<Format> {
    if let Some(format) = declared {
        return Ok(format);
    }
    let extension = extension.unwrap_or_default();
    Format::from_extension(extension)
        .ok_or_else(|| Error::UnsupportedFormat(format!("extension '{extension}'")))
}

/// Decode raw bytes into flat content
pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<ParsedContent> {
    let source = std::str::from_utf8(bytes)?;
    decode_str(source, options)
}

/// Decode text into flat content
pub fn decode_str(source: &str, options: &DecodeOptions) -> Result<ParsedContent> {
    let format = resolve_format(options.format, options.extension.as_deref())?;

    match format {
        Format::Yaml | Format::Toml | Format::Json => {
            let tree = format.handler().decode(source)?;
            Ok(ParsedContent::from_tree(&tree))
        }
        Format::YamlFrontmatter | Format::TomlFrontmatter | Format::JsonFrontmatter => {
            let (format, delimiters) = match &options.delimiters {
                Some(delimiters) => (format, delimiters.clone()),
                None => {
                    let format = frontmatter::sniff(source, format);
                    (format, front_matter_delimiters(format))
                }
            };
            frontmatter::decode(source, format, &delimiters)
        }
    }
}

/// Encode flat content as file text ending in a single newline
pub fn encode(content: &ParsedContent, options: &EncodeOptions) -> Result<String> {
    let format = options.format;

    match format {
        Format::Yaml | Format::Toml | Format::Json => {
            let tree = content.to_tree()?;
            let text = format.handler().encode(&tree, options.quote)?;
            Ok(format!("{}\n", text.trim_end_matches('\n')))
        }
        Format::YamlFrontmatter | Format::TomlFrontmatter | Format::JsonFrontmatter => {
            let delimiters = options
                .delimiters
                .clone()
                .unwrap_or_else(|| front_matter_delimiters(format));
            frontmatter::encode(content, format, &delimiters, options.quote)
        }
    }
}

fn front_matter_delimiters(format: Format) -> Delimiters {
    format
        .default_delimiters()
        .unwrap_or_else(|| Delimiters::symmetric("---"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declared_format_wins_over_extension() {
        assert_eq!(
            resolve_format(Some(Format::Toml), Some("md")).unwrap(),
            Format::Toml
        );
        assert_eq!(
            resolve_format(None, Some("md")).unwrap(),
            Format::YamlFrontmatter
        );
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        assert!(matches!(
            resolve_format(None, Some("exe")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let options = DecodeOptions::for_extension("json");
        assert!(matches!(
            decode(&[0xff, 0xfe], &options),
            Err(Error::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_custom_delimiters() {
        let options = DecodeOptions::for_extension("md")
            .with_delimiters(Some(Delimiters::symmetric("~~~")));
        let content = decode_str("~~~\ntitle: A\n~~~\nText\n", &options).unwrap();
        assert_eq!(content.get("title"), Some(&json!("A")));
        assert_eq!(content.body(), Some("Text"));
    }
}
