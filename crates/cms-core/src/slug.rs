//! Entry slugs
//!
//! A path-derived slug is authoritative. Content is consulted only when the
//! layout's path carries no slug (a `path` template without `{{slug}}`), in
//! which case the first identifier field with a value is slugified.

use chrono::{DateTime, Datelike, Timelike, Utc};
use cms_content::ParsedContent;

use crate::layout::{EntryLayout, field_value, fill_template};
use crate::{Error, Result};

/// Lowercase, ASCII, hyphen-separated form of `text`
pub fn slugify(text: &str) -> String {
    rslug::slugify!(text)
}

/// Value of the first identifier field present in `content`
pub fn identifier(layout: &EntryLayout, content: &ParsedContent) -> Option<String> {
    layout
        .identifier_fields()
        .iter()
        .find_map(|field| field_value(content, field))
}

/// Slug of an existing file, or `None` when nothing yields one
pub fn derive_slug(
    layout: &EntryLayout,
    path_slug: Option<&str>,
    content: &ParsedContent,
) -> Option<String> {
    if let Some(slug) = path_slug.filter(|s| !s.is_empty()) {
        return Some(slug.to_string());
    }
    if layout.path_has_slug() {
        return None;
    }
    identifier(layout, content)
        .map(|value| slugify(&value))
        .filter(|slug| !slug.is_empty())
}

/// Slug for a new entry from the collection's slug template.
///
/// The default template `{{slug}}` resolves to the identifier field. Date
/// placeholders (`{{year}}`, `{{month}}`, `{{day}}`, `{{hour}}`,
/// `{{minute}}`, `{{second}}`) come from `now`; any other name is a content
/// field.
pub fn new_entry_slug(
    layout: &EntryLayout,
    content: &ParsedContent,
    now: DateTime<Utc>,
) -> Result<String> {
    if let Some(name) = layout.file_name() {
        return Ok(name.to_string());
    }

    let template = layout.slug_template().unwrap_or("{{slug}}");
    let slug = fill_template(template, |name| {
        let value = match name {
            "slug" => identifier(layout, content),
            "year" => Some(format!("{:04}", now.year())),
            "month" => Some(format!("{:02}", now.month())),
            "day" => Some(format!("{:02}", now.day())),
            "hour" => Some(format!("{:02}", now.hour())),
            "minute" => Some(format!("{:02}", now.minute())),
            "second" => Some(format!("{:02}", now.second())),
            field => field_value(content, field),
        };
        value.map(|v| slugify(&v)).ok_or_else(|| {
            Error::invalid_edit(format!(
                "slug template field '{name}' has no value in collection '{}'",
                layout.collection()
            ))
        })
    })?;

    if slug.trim_matches('-').is_empty() {
        return Err(Error::invalid_edit(format!(
            "empty slug for new entry in collection '{}'",
            layout.collection()
        )));
    }
    Ok(slug)
}
