//! Locale reconciliation
//!
//! [`assemble`] merges parsed per-locale files into logical [`Entry`]
//! values; [`disassemble`] turns an entry's locale contents back into one
//! [`LocalizedRecord`] per file to write. Both are pure: they build new
//! values and never modify their inputs.
//!
//! Files are grouped under a merge key `collection/key`, where `key` is the
//! canonical slug field for multi-file layouts (falling back to the file's
//! own slug) and the slug otherwise. Input is sorted by path first, so the
//! same file set always yields the same entries; on any conflict the file
//! with the smaller path wins and the other is reported.

use std::collections::{BTreeMap, HashMap, HashSet};

use cms_content::ParsedContent;
use cms_git::RepositoryFile;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::EntryContext;
use crate::config::I18nStructure;
use crate::error::SyncWarning;
use crate::layout::{EntryLayout, field_value};
use crate::slug::derive_slug;
use crate::{Error, Result};

/// One locale's materialization of an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedRecord {
    pub locale: String,
    pub slug: String,
    pub path: String,
    pub sha: String,
    pub content: ParsedContent,
}

/// A logical, locale-merged document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// `collection/slug`
    pub id: String,
    pub collection: String,
    /// Listed file name, for file collections
    pub file_name: Option<String>,
    pub slug: String,
    pub sha: String,
    pub locales: BTreeMap<String, LocalizedRecord>,
}

impl Entry {
    pub fn locale(&self, locale: &str) -> Option<&LocalizedRecord> {
        self.locales.get(locale)
    }

    /// Distinct file paths backing this entry
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.locales.values().map(|r| r.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

/// An entry file after decoding
#[derive(Debug, Clone)]
pub struct ParsedEntryFile {
    pub file: RepositoryFile,
    pub context: EntryContext,
    pub content: ParsedContent,
}

/// Entries plus the files that could not be merged
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    pub entries: Vec<Entry>,
    pub warnings: Vec<SyncWarning>,
}

struct Group {
    collection: String,
    file_name: Option<String>,
    default_locale: String,
    records: BTreeMap<String, LocalizedRecord>,
    /// Locales in discovery order
    order: Vec<String>,
}

impl Group {
    fn insert(&mut self, record: LocalizedRecord, key: &str, warnings: &mut Vec<SyncWarning>) {
        if let Some(existing) = self.records.get(&record.locale) {
            warnings.push(SyncWarning::reconcile(
                &record.path,
                format!(
                    "locale '{}' of '{key}' is already provided by {}",
                    record.locale, existing.path
                ),
            ));
            return;
        }
        self.order.push(record.locale.clone());
        self.records.insert(record.locale.clone(), record);
    }

    fn paths(&self) -> impl Iterator<Item = &str> {
        self.records.values().map(|r| r.path.as_str())
    }
}

/// Merge per-locale files into entries
pub fn assemble(mut files: Vec<ParsedEntryFile>) -> Assembled {
    files.sort_by(|a, b| a.file.path.cmp(&b.file.path));

    let mut warnings = Vec::new();
    let mut groups: Vec<(String, Group)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for parsed in files {
        let layout = parsed.context.layout.clone();
        let i18n = layout.i18n();

        let records = if i18n.structure == Some(I18nStructure::SingleFile) {
            split_single_file(&parsed, &layout)
        } else {
            derive_slug(&layout, parsed.context.slug.as_deref(), &parsed.content)
                .map(|slug| {
                    vec![LocalizedRecord {
                        locale: parsed.context.locale.clone(),
                        slug,
                        path: parsed.file.path.clone(),
                        sha: parsed.file.sha.clone(),
                        content: parsed.content.clone(),
                    }]
                })
                .ok_or_else(|| "no slug could be derived from the path or content".to_string())
        };

        let records = match records {
            Ok(records) => records,
            Err(message) => {
                tracing::debug!(path = %parsed.file.path, %message, "dropping entry file");
                warnings.push(SyncWarning::reconcile(&parsed.file.path, message));
                continue;
            }
        };

        for record in records {
            let merge_slug = if i18n.merges_by_canonical_slug() {
                field_value(&record.content, &i18n.canonical_slug_key)
                    .unwrap_or_else(|| record.slug.clone())
            } else {
                record.slug.clone()
            };
            let key = format!("{}/{merge_slug}", layout.collection());

            let position = *index.entry(key.clone()).or_insert_with(|| {
                groups.push((
                    key.clone(),
                    Group {
                        collection: layout.collection().to_string(),
                        file_name: layout.file_name().map(str::to_string),
                        default_locale: i18n.default_locale.clone(),
                        records: BTreeMap::new(),
                        order: Vec::new(),
                    },
                ));
                groups.len() - 1
            });
            groups[position].1.insert(record, &key, &mut warnings);
        }
    }

    let mut entries = Vec::with_capacity(groups.len());
    let mut seen = HashSet::new();
    for (key, group) in groups {
        let authoritative = group
            .records
            .get(&group.default_locale)
            .or_else(|| group.order.first().and_then(|l| group.records.get(l)));
        let Some(authoritative) = authoritative else {
            continue;
        };

        if authoritative.slug.is_empty() {
            for path in group.paths() {
                warnings.push(SyncWarning::reconcile(path, format!("'{key}' has an empty slug")));
            }
            continue;
        }

        let id = format!("{}/{}", group.collection, authoritative.slug);
        if !seen.insert(id.clone()) {
            for path in group.paths() {
                warnings.push(SyncWarning::reconcile(
                    path,
                    format!("entry id '{id}' is already taken"),
                ));
            }
            continue;
        }

        entries.push(Entry {
            id,
            collection: group.collection.clone(),
            file_name: group.file_name.clone(),
            slug: authoritative.slug.clone(),
            sha: authoritative.sha.clone(),
            locales: group.records.clone(),
        });
    }

    tracing::debug!(
        entries = entries.len(),
        dropped = warnings.len(),
        "assembled entries"
    );
    Assembled { entries, warnings }
}

/// One record per locale present in a single-file entry
fn split_single_file(
    parsed: &ParsedEntryFile,
    layout: &EntryLayout,
) -> std::result::Result<Vec<LocalizedRecord>, String> {
    let i18n = layout.i18n();
    let scoped: Vec<(String, ParsedContent)> = i18n
        .locales
        .iter()
        .map(|locale| (locale.clone(), parsed.content.scoped(locale)))
        .filter(|(_, content)| !content.is_empty())
        .collect();
    if scoped.is_empty() {
        return Err("no configured locale found in the file".to_string());
    }

    let slug_source = scoped
        .iter()
        .find(|(locale, _)| *locale == i18n.default_locale)
        .unwrap_or(&scoped[0]);
    let slug = derive_slug(layout, parsed.context.slug.as_deref(), &slug_source.1)
        .ok_or_else(|| "no slug could be derived from the path or content".to_string())?;

    Ok(scoped
        .into_iter()
        .map(|(locale, content)| LocalizedRecord {
            locale,
            slug: slug.clone(),
            path: parsed.file.path.clone(),
            sha: parsed.file.sha.clone(),
            content,
        })
        .collect())
}

/// Build the records to write for an entry.
///
/// `locales` holds the edited content per locale. With `save_all_locales`
/// every locale that has content (edited or already saved in `existing`) is
/// written; otherwise only the edited locales are. Single-file entries are
/// always written whole, as one record under the default locale.
pub fn disassemble(
    layout: &EntryLayout,
    slug: &str,
    locales: &BTreeMap<String, ParsedContent>,
    existing: Option<&Entry>,
) -> Result<Vec<LocalizedRecord>> {
    let i18n = layout.i18n();
    let locales = normalize_locales(layout, locales)?;

    let content_for = |locale: &str| -> Option<ParsedContent> {
        locales.get(locale).cloned().or_else(|| {
            existing
                .and_then(|e| e.locale(locale))
                .map(|r| r.content.clone())
        })
    };
    let existing_sha = |locale: &str| -> String {
        existing
            .and_then(|e| e.locale(locale))
            .map(|r| r.sha.clone())
            .unwrap_or_default()
    };

    let default_content = content_for(&i18n.default_locale)
        .or_else(|| locales.values().next().cloned())
        .unwrap_or_default();

    if i18n.structure == Some(I18nStructure::SingleFile) {
        let mut merged = ParsedContent::new();
        for locale in &i18n.locales {
            if let Some(content) = content_for(locale) {
                merged.extend(content.prefixed(locale));
            }
        }
        let subpath = layout.render_subpath(slug, &default_content, &i18n.default_locale)?;
        return Ok(vec![LocalizedRecord {
            locale: i18n.default_locale.clone(),
            slug: slug.to_string(),
            path: layout.build_path(&subpath, &i18n.default_locale),
            sha: existing_sha(&i18n.default_locale),
            content: merged,
        }]);
    }

    let targets: Vec<&String> = if i18n.save_all_locales {
        i18n.locales
            .iter()
            .filter(|l| locales.contains_key(*l) || existing.is_some_and(|e| e.locale(l).is_some()))
            .collect()
    } else {
        i18n.locales.iter().filter(|l| locales.contains_key(*l)).collect()
    };

    let canonical = if i18n.merges_by_canonical_slug() {
        std::iter::once(&i18n.default_locale)
            .chain(i18n.locales.iter())
            .filter_map(|l| content_for(l))
            .find_map(|c| field_value(&c, &i18n.canonical_slug_key))
    } else {
        None
    };

    let mut records = Vec::with_capacity(targets.len());
    for locale in targets {
        let Some(mut content) = content_for(locale) else {
            continue;
        };
        if let Some(value) = &canonical {
            content.insert(
                cms_content::flatten::escape_segment(&i18n.canonical_slug_key),
                Value::String(value.clone()),
            );
        }
        let subpath = layout.render_subpath(slug, &default_content, locale)?;
        records.push(LocalizedRecord {
            locale: locale.clone(),
            slug: slug.to_string(),
            path: layout.build_path(&subpath, locale),
            sha: existing_sha(locale),
            content,
        });
    }

    if records.is_empty() {
        return Err(Error::invalid_edit(format!(
            "entry '{slug}' in collection '{}' has no locale content to save",
            layout.collection()
        )));
    }
    Ok(records)
}

/// Reject unknown locales; content of a non-localized entry may be given
/// under any single key
fn normalize_locales(
    layout: &EntryLayout,
    locales: &BTreeMap<String, ParsedContent>,
) -> Result<BTreeMap<String, ParsedContent>> {
    let i18n = layout.i18n();
    if !i18n.is_enabled() && locales.len() == 1 {
        let content = locales.values().next().cloned().unwrap_or_default();
        return Ok(BTreeMap::from([(i18n.default_locale.clone(), content)]));
    }
    if let Some(unknown) = locales.keys().find(|l| !i18n.locales.contains(l)) {
        return Err(Error::invalid_edit(format!(
            "locale '{unknown}' is not configured for collection '{}'",
            layout.collection()
        )));
    }
    Ok(locales.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Collection, ResolvedI18n};
    use crate::layout::EntryLayout;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn layout(structure: Option<I18nStructure>) -> Arc<EntryLayout> {
        let collection = Collection {
            name: "pages".into(),
            folder: Some("pages".into()),
            ..Collection::default()
        };
        let i18n = match structure {
            Some(s) => ResolvedI18n {
                structure: Some(s),
                locales: vec!["en".into(), "ja".into()],
                default_locale: "en".into(),
                omit_default_locale_from_filename: true,
                save_all_locales: true,
                canonical_slug_key: "translationKey".into(),
            },
            None => ResolvedI18n::disabled(),
        };
        Arc::new(EntryLayout::for_folder(&collection, i18n).unwrap())
    }

    fn parsed(layout: &Arc<EntryLayout>, path: &str, content: serde_json::Value) -> ParsedEntryFile {
        let found = layout.match_path(path).unwrap();
        ParsedEntryFile {
            file: RepositoryFile::new(path, format!("sha-{path}")),
            context: EntryContext {
                layout: layout.clone(),
                locale: found.locale,
                subpath: found.subpath,
                slug: found.slug,
            },
            content: ParsedContent::from_tree(&content),
        }
    }

    #[test]
    fn canonical_slug_merges_differently_named_files() {
        let layout = layout(Some(I18nStructure::MultipleFiles));
        let out = assemble(vec![
            parsed(&layout, "pages/uber-uns.ja.md", json!({"translationKey": "about"})),
            parsed(&layout, "pages/about.md", json!({"translationKey": "about"})),
        ]);
        assert!(out.warnings.is_empty());
        assert_eq!(out.entries.len(), 1);
        let entry = &out.entries[0];
        assert_eq!(entry.id, "pages/about");
        assert_eq!(entry.sha, "sha-pages/about.md");
        assert_eq!(entry.locales["ja"].slug, "uber-uns");
    }

    #[test]
    fn first_locale_is_authoritative_without_default() {
        let layout = layout(Some(I18nStructure::MultipleFolders));
        let out = assemble(vec![parsed(&layout, "pages/ja/about.md", json!({}))]);
        assert_eq!(out.entries[0].id, "pages/about");
        assert_eq!(out.entries[0].locales.keys().collect::<Vec<_>>(), vec!["ja"]);
    }

    #[test]
    fn duplicate_locale_keeps_first_path() {
        let layout = layout(Some(I18nStructure::MultipleFiles));
        let out = assemble(vec![
            parsed(&layout, "pages/b.ja.md", json!({"translationKey": "k"})),
            parsed(&layout, "pages/a.ja.md", json!({"translationKey": "k"})),
        ]);
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].locales["ja"].path, "pages/a.ja.md");
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].path, "pages/b.ja.md");
    }

    #[test]
    fn colliding_ids_are_reported() {
        let layout = layout(Some(I18nStructure::MultipleFiles));
        let out = assemble(vec![
            parsed(&layout, "pages/a.md", json!({"translationKey": "one"})),
            parsed(&layout, "pages/a.ja.md", json!({"translationKey": "two"})),
        ]);
        let ids: Vec<&str> = out.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["pages/a"]);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn single_file_splits_locales() {
        let layout = layout(Some(I18nStructure::SingleFile));
        let out = assemble(vec![parsed(
            &layout,
            "pages/home.md",
            json!({"en": {"title": "Home"}, "ja": {"title": "ホーム"}}),
        )]);
        let entry = &out.entries[0];
        assert_eq!(entry.id, "pages/home");
        assert_eq!(entry.locales["ja"].content.get_str("title"), Some("ホーム"));
        assert_eq!(entry.paths(), vec!["pages/home.md"]);

        let locales: BTreeMap<_, _> = entry
            .locales
            .iter()
            .map(|(l, r)| (l.clone(), r.content.clone()))
            .collect();
        let records = disassemble(&layout, "home", &locales, Some(entry)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "pages/home.md");
        assert_eq!(
            records[0].content,
            ParsedContent::from_tree(&json!({"en": {"title": "Home"}, "ja": {"title": "ホーム"}}))
        );
    }

    #[test]
    fn single_file_without_locales_is_dropped() {
        let layout = layout(Some(I18nStructure::SingleFile));
        let out = assemble(vec![parsed(&layout, "pages/x.md", json!({"title": "x"}))]);
        assert!(out.entries.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn disassemble_saves_all_locales_with_canonical_key() {
        let layout = layout(Some(I18nStructure::MultipleFiles));
        let existing = assemble(vec![
            parsed(&layout, "pages/about.md", json!({"title": "About", "translationKey": "about"})),
            parsed(&layout, "pages/about.ja.md", json!({"title": "概要"})),
        ])
        .entries
        .remove(0);

        let edited = BTreeMap::from([(
            "en".to_string(),
            ParsedContent::from_tree(&json!({"title": "About us", "translationKey": "about"})),
        )]);
        let records = disassemble(&layout, "about", &edited, Some(&existing)).unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["pages/about.md", "pages/about.ja.md"]);
        assert_eq!(records[1].content.get_str("translationKey"), Some("about"));
        assert_eq!(records[1].sha, "sha-pages/about.ja.md");
    }

    #[test]
    fn disassemble_rejects_unknown_locale() {
        let layout = layout(Some(I18nStructure::MultipleFiles));
        let edited = BTreeMap::from([("fr".to_string(), ParsedContent::new())]);
        assert!(disassemble(&layout, "x", &edited, None).is_err());
    }

    #[test]
    fn non_localized_accepts_any_single_key() {
        let layout = layout(None);
        let edited = BTreeMap::from([("en".to_string(), ParsedContent::new())]);
        let records = disassemble(&layout, "post", &edited, None).unwrap();
        assert_eq!(records[0].path, "pages/post.md");
        assert_eq!(records[0].locale, "_default");
    }
}
