//! Entry assembly over classified locale files

use std::collections::{BTreeMap, HashSet};

use cms_content::ParsedContent;
use cms_core::reconcile::ParsedEntryFile;
use cms_core::{LayoutCache, PathClassifier, SiteConfig, assemble};
use cms_git::RepositoryFile;
use proptest::prelude::*;
use serde_json::json;

fn config() -> SiteConfig {
    SiteConfig::from_str_with_format(
        r#"
backend:
  repo: owner/site
i18n:
  locales: [en, ja]
  omit_default_locale_from_filename: true
collections:
  - name: pages
    folder: content/pages
    i18n: true
"#,
        "yaml",
    )
    .unwrap()
}

fn parse(config: &SiteConfig, files: &BTreeMap<String, Option<String>>) -> Vec<ParsedEntryFile> {
    let layouts = LayoutCache::new(4);
    let classifier = PathClassifier::new(config, &layouts).unwrap();
    let listing = files
        .keys()
        .map(|path| RepositoryFile::new(path.as_str(), format!("sha-{path}")))
        .collect();
    classifier
        .classify(listing)
        .entry_files
        .into_iter()
        .map(|classified| {
            let context = classified.entry_context().cloned().unwrap();
            let key = files[&classified.file.path].clone();
            let content = ParsedContent::from_tree(&json!({
                "title": classified.file.name,
                "translationKey": key,
            }));
            ParsedEntryFile {
                file: classified.file,
                context,
                content,
            }
        })
        .collect()
}

type Shape = Vec<(String, String, Vec<String>)>;

fn shape(files: Vec<ParsedEntryFile>) -> Shape {
    assemble(files)
        .entries
        .into_iter()
        .map(|e| (e.id, e.slug, e.locales.into_keys().collect()))
        .collect()
}

fn file_set() -> impl Strategy<Value = BTreeMap<String, Option<String>>> {
    prop::collection::btree_map(
        ("[a-d]", any::<bool>()).prop_map(|(slug, ja)| {
            if ja {
                format!("content/pages/{slug}.ja.md")
            } else {
                format!("content/pages/{slug}.md")
            }
        }),
        prop::option::of("[x-z]"),
        0..10,
    )
}

proptest! {
    #[test]
    fn assemble_never_returns_duplicate_ids(files in file_set()) {
        let config = config();
        let entries = assemble(parse(&config, &files)).entries;
        let mut ids = HashSet::new();
        for entry in &entries {
            prop_assert!(ids.insert(entry.id.clone()), "duplicate id {}", entry.id);
            prop_assert!(!entry.locales.is_empty());
        }
    }

    #[test]
    fn assemble_is_idempotent_and_order_independent(files in file_set()) {
        let config = config();
        let parsed = parse(&config, &files);
        let mut reversed = parsed.clone();
        reversed.reverse();

        let first = shape(parsed.clone());
        prop_assert_eq!(&first, &shape(parsed));
        prop_assert_eq!(&first, &shape(reversed));
    }

    #[test]
    fn every_file_is_published_or_reported(files in file_set()) {
        let config = config();
        let assembled = assemble(parse(&config, &files));
        let published: HashSet<&str> = assembled
            .entries
            .iter()
            .flat_map(|e| e.locales.values().map(|r| r.path.as_str()))
            .collect();
        let reported: HashSet<&str> = assembled.warnings.iter().map(|w| w.path.as_str()).collect();
        for path in files.keys() {
            prop_assert!(
                published.contains(path.as_str()) || reported.contains(path.as_str()),
                "{} vanished", path
            );
        }
    }
}

#[test]
fn canonical_key_overrides_file_slug() {
    let config = config();
    let files = BTreeMap::from([
        ("content/pages/about.md".to_string(), Some("about".to_string())),
        ("content/pages/uber-uns.ja.md".to_string(), Some("about".to_string())),
    ]);
    let entries = assemble(parse(&config, &files)).entries;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "pages/about");
    assert_eq!(entries[0].locale("ja").unwrap().slug, "uber-uns");
}
