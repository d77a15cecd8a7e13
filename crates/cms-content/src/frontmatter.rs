//! Front-matter splitting and joining
//!
//! A front-matter file is a structured header between a start and an end
//! delimiter line, followed by an opaque body:
//!
//! ```text
//! ---
//! title: Hello
//! ---
//! Body text
//! ```
//!
//! JSON headers delimited by `{` and `}` keep the braces as part of the
//! header document.

use serde_json::Value;

use crate::content::{BODY_KEY, ParsedContent};
use crate::error::{Error, Result};
use crate::format::{Delimiters, Format, QuoteStyle};

/// Header and body regions of a front-matter file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    /// Text between the delimiter lines (`None` when the file has no header)
    pub header: Option<&'a str>,
    pub body: &'a str,
}

/// Split `source` at the first header delimited by `delimiters`.
pub fn split<'a>(source: &'a str, delimiters: &Delimiters) -> Split<'a> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let no_header = Split {
        header: None,
        body: source,
    };

    let Some(after_start) = strip_line(source, &delimiters.start) else {
        return no_header;
    };

    let mut offset = 0;
    for line in after_start.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == delimiters.end {
            let header = after_start[..offset].trim_end_matches(['\r', '\n']);
            let body = &after_start[offset + line.len()..];
            return Split {
                header: Some(header),
                body,
            };
        }
        offset += line.len();
    }

    no_header
}

/// Return the rest of `source` if its first line is exactly `marker`
fn strip_line<'a>(source: &'a str, marker: &str) -> Option<&'a str> {
    let rest = source.strip_prefix(marker)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// Pick the front-matter format actually present in `source`.
///
/// The declared format wins when its delimiter opens the file; otherwise a
/// file opening with another known delimiter is read with that format.
pub fn sniff(source: &str, declared: Format) -> Format {
    let candidates = [
        declared,
        Format::YamlFrontmatter,
        Format::TomlFrontmatter,
        Format::JsonFrontmatter,
    ];
    candidates
        .into_iter()
        .find(|format| {
            format
                .default_delimiters()
                .is_some_and(|d| strip_line(source, &d.start).is_some())
        })
        .unwrap_or(declared)
}

fn wraps_json(format: Format, delimiters: &Delimiters) -> bool {
    format.data_format() == Format::Json && delimiters.start == "{" && delimiters.end == "}"
}

/// Decode a front-matter file into flat content with the body under `body`
pub fn decode(source: &str, format: Format, delimiters: &Delimiters) -> Result<ParsedContent> {
    let parts = split(source, delimiters);
    let mut content = match parts.header {
        Some(header) => {
            let tree = if wraps_json(format, delimiters) {
                format.handler().decode(&format!("{{{header}}}"))?
            } else {
                format.handler().decode(header)?
            };
            ParsedContent::from_tree(&tree)
        }
        None => ParsedContent::new(),
    };

    let nested_body = format!("{BODY_KEY}.");
    let shadowed: Vec<String> = content
        .iter()
        .filter(|(key, _)| key.starts_with(&nested_body))
        .map(|(key, _)| key.clone())
        .collect();
    for key in shadowed {
        content.remove(&key);
    }

    let body = parts.body.strip_suffix('\n').unwrap_or(parts.body);
    content.insert(BODY_KEY, Value::String(body.to_string()));
    Ok(content)
}

/// Encode flat content as a front-matter file
pub fn encode(
    content: &ParsedContent,
    format: Format,
    delimiters: &Delimiters,
    quote: QuoteStyle,
) -> Result<String> {
    let mut header = content.clone();
    let body = match header.remove(BODY_KEY) {
        Some(Value::String(body)) => body,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let mut out = String::new();
    out.push_str(&delimiters.start);
    out.push('\n');

    if !header.is_empty() {
        let tree = header.to_tree()?;
        let text = format.handler().encode(&tree, quote)?;
        let text = text.trim_end_matches('\n');
        let text = if wraps_json(format, delimiters) {
            text.strip_prefix('{')
                .and_then(|t| t.strip_suffix('}'))
                .map(|t| t.trim_matches('\n'))
                .unwrap_or(text)
        } else {
            text
        };
        if text
            .lines()
            .any(|line| line.trim_end_matches('\r') == delimiters.end)
        {
            return Err(Error::serialize(
                format.data_format().to_string(),
                format!("header line collides with the '{}' delimiter", delimiters.end),
            ));
        }
        out.push_str(text);
        out.push('\n');
    }

    out.push_str(&delimiters.end);
    out.push('\n');
    out.push_str(&body);
    out.push('\n');
    Ok(out)
}
