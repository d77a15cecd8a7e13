//! Entry file layouts
//!
//! An [`EntryLayout`] compiles a collection's folder, path template,
//! extension and locale structure into the regexes used to recognize its
//! entry files, and into the inverse path builder used when saving. Both
//! directions share one definition so classification and saving agree.
//!
//! | structure | default locale | other locale |
//! |-----------|----------------|--------------|
//! | none / single file | `posts/a.md` | (same file) |
//! | multiple files | `posts/a.en.md` (or `posts/a.md` when omitted) | `posts/a.ja.md` |
//! | multiple folders | `posts/en/a.md` | `posts/ja/a.md` |
//! | multiple folders, i18n root | `en/posts/a.md` | `ja/posts/a.md` |

use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock};

use cms_content::{DecodeOptions, Delimiters, EncodeOptions, Format, ParsedContent, QuoteStyle};
use cms_fs::RepoPath;
use cms_fs::checksum::compute_structural_checksum;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;

use crate::config::{Collection, I18nStructure, ResolvedI18n, SiteConfig};
use crate::slug::slugify;
use crate::{Error, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([\w.\-]+)\s*\}\}").expect("placeholder regex is valid")
});

/// How the part of an entry path between folder and extension is formed
#[derive(Debug, Clone, PartialEq, Eq)]
enum SubpathRule {
    /// Any single path segment, which is also the slug
    Any,
    /// A `path` template such as `{{year}}/{{slug}}`
    Template(String),
    /// A fixed file of a file collection
    Literal(String),
}

/// Result of matching a repository path against a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutMatch {
    pub locale: String,
    /// Path below the folder without locale and extension
    pub subpath: String,
    /// Slug carried by the path, if the layout encodes one
    pub slug: Option<String>,
}

/// Compiled path rules for one folder collection or one listed file
#[derive(Debug)]
pub struct EntryLayout {
    collection: String,
    file_name: Option<String>,
    folder: RepoPath,
    extension: String,
    format: Option<Format>,
    delimiters: Option<Delimiters>,
    quote: QuoteStyle,
    subpath: SubpathRule,
    i18n: ResolvedI18n,
    identifier_fields: Vec<String>,
    slug_template: Option<String>,
    index_file: bool,
    localized: Option<Regex>,
    plain: Option<Regex>,
}

impl EntryLayout {
    /// Layout of a folder collection
    pub fn for_folder(collection: &Collection, i18n: ResolvedI18n) -> Result<Self> {
        let folder = RepoPath::new(collection.folder.as_deref().unwrap_or_default());
        let subpath = match &collection.path {
            Some(template) => {
                SubpathRule::Template(template.trim_matches('/').to_string())
            }
            None => SubpathRule::Any,
        };
        Self::compile(
            collection,
            None,
            folder,
            collection.entry_extension(),
            subpath,
            i18n,
        )
    }

    /// Layout of one file in a file collection
    pub fn for_file(collection: &Collection, file_name: &str, i18n: ResolvedI18n) -> Result<Self> {
        let file = collection.file(file_name).ok_or_else(|| Error::Layout {
            collection: collection.name.clone(),
            message: format!("no file named '{file_name}'"),
        })?;
        let path = RepoPath::new(&file.file);
        let extension = path.extension().ok_or_else(|| Error::Layout {
            collection: collection.name.clone(),
            message: format!("file '{}' has no extension", file.file),
        })?;
        let folder = path.parent().unwrap_or_else(|| RepoPath::new(""));
        Self::compile(
            collection,
            Some(file.name.clone()),
            folder,
            extension.to_string(),
            SubpathRule::Literal(path.stem().to_string()),
            i18n,
        )
    }

    fn compile(
        collection: &Collection,
        file_name: Option<String>,
        folder: RepoPath,
        extension: String,
        subpath: SubpathRule,
        i18n: ResolvedI18n,
    ) -> Result<Self> {
        let folder_prefix = if folder.is_root() {
            String::new()
        } else {
            format!("{}/", regex::escape(folder.as_str()))
        };
        let sub = match &subpath {
            SubpathRule::Any => "(?P<sub>[^/]+)".to_string(),
            SubpathRule::Template(template) => format!("(?P<sub>{})", template_regex(template)),
            SubpathRule::Literal(stem) => format!("(?P<sub>{})", regex::escape(stem)),
        };
        let ext = regex::escape(&extension);
        let locales = format!(
            "(?P<locale>{})",
            i18n.locales
                .iter()
                .map(|l| regex::escape(l))
                .collect::<Vec<_>>()
                .join("|")
        );

        let (localized, plain) = match i18n.structure {
            None | Some(I18nStructure::SingleFile) => {
                (None, Some(format!("^{folder_prefix}{sub}\\.{ext}$")))
            }
            Some(I18nStructure::MultipleFiles) => (
                Some(format!("^{folder_prefix}{sub}\\.{locales}\\.{ext}$")),
                i18n.omit_default_locale_from_filename
                    .then(|| format!("^{folder_prefix}{sub}\\.{ext}$")),
            ),
            Some(I18nStructure::MultipleFolders) => (
                Some(format!("^{folder_prefix}{locales}/{sub}\\.{ext}$")),
                None,
            ),
            Some(I18nStructure::MultipleFoldersI18nRoot) => (
                Some(format!("^{locales}/{folder_prefix}{sub}\\.{ext}$")),
                None,
            ),
        };

        let build = |pattern: Option<String>| -> Result<Option<Regex>> {
            pattern
                .map(|p| {
                    Regex::new(&p).map_err(|e| Error::Layout {
                        collection: collection.name.clone(),
                        message: e.to_string(),
                    })
                })
                .transpose()
        };

        Ok(Self {
            collection: collection.name.clone(),
            file_name,
            folder,
            extension,
            format: collection.format,
            delimiters: collection.delimiters(),
            quote: collection.yaml_quote,
            subpath,
            i18n,
            identifier_fields: collection
                .identifier_fields()
                .into_iter()
                .map(str::to_string)
                .collect(),
            slug_template: collection.slug.clone(),
            index_file: collection.index_file,
            localized: build(localized)?,
            plain: build(plain)?,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Name of the listed file, for file collections
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn folder(&self) -> &RepoPath {
        &self.folder
    }

    pub fn i18n(&self) -> &ResolvedI18n {
        &self.i18n
    }

    pub fn identifier_fields(&self) -> &[String] {
        &self.identifier_fields
    }

    pub fn slug_template(&self) -> Option<&str> {
        self.slug_template.as_deref()
    }

    /// Whether the path itself can carry a slug
    pub fn path_has_slug(&self) -> bool {
        match &self.subpath {
            SubpathRule::Any | SubpathRule::Literal(_) => true,
            SubpathRule::Template(template) => PLACEHOLDER
                .captures_iter(template)
                .any(|c| &c[1] == "slug"),
        }
    }

    /// Match a repository path, returning its locale and slug
    pub fn match_path(&self, path: &str) -> Option<LayoutMatch> {
        let (caps, locale) = match self.localized.as_ref().and_then(|re| re.captures(path)) {
            Some(caps) => {
                let locale = caps.name("locale")?.as_str().to_string();
                (caps, locale)
            }
            None => {
                let caps = self.plain.as_ref()?.captures(path)?;
                (caps, self.i18n.default_locale.clone())
            }
        };

        let subpath = caps.name("sub")?.as_str().to_string();
        if !self.index_file
            && self.file_name.is_none()
            && subpath.rsplit('/').next() == Some("_index")
        {
            return None;
        }

        let slug = match &self.subpath {
            SubpathRule::Any => Some(subpath.clone()),
            SubpathRule::Literal(_) => self.file_name.clone(),
            SubpathRule::Template(_) => caps.name("slug").map(|m| m.as_str().to_string()),
        };

        Some(LayoutMatch {
            locale,
            subpath,
            slug,
        })
    }

    /// Render the subpath of an entry from its slug and content
    pub fn render_subpath(&self, slug: &str, content: &ParsedContent, locale: &str) -> Result<String> {
        match &self.subpath {
            SubpathRule::Literal(stem) => Ok(stem.clone()),
            SubpathRule::Any => {
                if slug.is_empty() || slug.contains('/') {
                    return Err(Error::invalid_edit(format!(
                        "'{slug}' is not a valid slug for collection '{}'",
                        self.collection
                    )));
                }
                Ok(slug.to_string())
            }
            SubpathRule::Template(template) => {
                fill_template(template, |name| match name {
                    "slug" => Ok(slug.to_string()),
                    "locale" => Ok(locale.to_string()),
                    field => field_value(content, field)
                        .map(|v| slugify(&v))
                        .ok_or_else(|| {
                            Error::invalid_edit(format!(
                                "path template field '{field}' has no value in collection '{}'",
                                self.collection
                            ))
                        }),
                })
            }
        }
    }

    /// Repository path of one locale's file
    pub fn build_path(&self, subpath: &str, locale: &str) -> String {
        let folder = self.folder.as_str();
        let ext = &self.extension;
        let path = match self.i18n.structure {
            None | Some(I18nStructure::SingleFile) => format!("{folder}/{subpath}.{ext}"),
            Some(I18nStructure::MultipleFiles) => {
                if self.i18n.omit_default_locale_from_filename && locale == self.i18n.default_locale {
                    format!("{folder}/{subpath}.{ext}")
                } else {
                    format!("{folder}/{subpath}.{locale}.{ext}")
                }
            }
            Some(I18nStructure::MultipleFolders) => format!("{folder}/{locale}/{subpath}.{ext}"),
            Some(I18nStructure::MultipleFoldersI18nRoot) => {
                format!("{locale}/{folder}/{subpath}.{ext}")
            }
        };
        RepoPath::new(path).to_string()
    }

    pub fn decode_options(&self, path: &str) -> DecodeOptions {
        let extension = RepoPath::new(path)
            .extension()
            .unwrap_or(&self.extension)
            .to_string();
        DecodeOptions::for_extension(extension)
            .with_format(self.format)
            .with_delimiters(self.delimiters.clone())
    }

    pub fn encode_options(&self) -> Result<EncodeOptions> {
        let format = cms_content::resolve_format(self.format, Some(&self.extension))?;
        Ok(EncodeOptions {
            format,
            delimiters: self.delimiters.clone(),
            quote: self.quote,
        })
    }
}

/// Regex source for a path template; `{{slug}}` becomes the `slug` group
fn template_regex(template: &str) -> String {
    let mut out = String::new();
    let mut last = 0;
    let mut slug_seen = false;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&regex::escape(&template[last..whole.start()]));
        if &caps[1] == "slug" && !slug_seen {
            out.push_str("(?P<slug>[^/]+)");
            slug_seen = true;
        } else {
            out.push_str("[^/]+");
        }
        last = whole.end();
    }
    out.push_str(&regex::escape(&template[last..]));
    out
}

/// Replace every `{{name}}` in `template` with `value(name)`
pub(crate) fn fill_template(
    template: &str,
    mut value: impl FnMut(&str) -> Result<String>,
) -> Result<String> {
    let mut out = String::new();
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        out.push_str(&value(&caps[1])?);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Scalar value of a top-level content field as text.
///
/// `fields.title` and `title` name the same field.
pub(crate) fn field_value(content: &ParsedContent, name: &str) -> Option<String> {
    let field = name.strip_prefix("fields.").unwrap_or(name);
    let value = match content.get(&cms_content::flatten::escape_segment(field))? {
        Value::String(text) => text.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(value).filter(|v| !v.trim().is_empty())
}

/// All compiled layouts of one collection
#[derive(Debug)]
pub struct CollectionLayout {
    collection: String,
    layouts: Vec<Arc<EntryLayout>>,
}

impl CollectionLayout {
    pub fn compile(config: &SiteConfig, collection: &Collection) -> Result<Self> {
        let i18n = config.resolve_i18n(collection)?;
        let layouts = if collection.is_folder() {
            vec![Arc::new(EntryLayout::for_folder(collection, i18n)?)]
        } else {
            collection
                .files
                .iter()
                .map(|file| EntryLayout::for_file(collection, &file.name, i18n.clone()).map(Arc::new))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Self {
            collection: collection.name.clone(),
            layouts,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn layouts(&self) -> &[Arc<EntryLayout>] {
        &self.layouts
    }

    /// First layout matching `path`
    pub fn match_path(&self, path: &str) -> Option<(Arc<EntryLayout>, LayoutMatch)> {
        self.layouts
            .iter()
            .find_map(|layout| layout.match_path(path).map(|m| (layout.clone(), m)))
    }

    /// Layout for an entry: the folder layout, or the named file's layout
    pub fn layout_for(&self, file_name: Option<&str>) -> Result<Arc<EntryLayout>> {
        let found = match file_name {
            Some(name) => self.layouts.iter().find(|l| l.file_name() == Some(name)),
            None => self.layouts.iter().find(|l| l.file_name().is_none()),
        };
        found.cloned().ok_or_else(|| Error::Layout {
            collection: self.collection.clone(),
            message: match file_name {
                Some(name) => format!("no file named '{name}'"),
                None => "file collections need a file name".to_string(),
            },
        })
    }
}

/// Bounded cache of compiled collection layouts.
///
/// Keys are a SHA-256 over the serialized collection and its effective
/// i18n rules, so a changed configuration never reuses a stale layout.
pub struct LayoutCache {
    inner: Mutex<LruCache<String, Arc<CollectionLayout>>>,
}

impl LayoutCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_or_compile(
        &self,
        config: &SiteConfig,
        collection: &Collection,
    ) -> Result<Arc<CollectionLayout>> {
        let i18n = config.resolve_i18n(collection)?;
        let key = compute_structural_checksum(&(collection, &i18n))?;

        if let Some(layout) = self.inner.lock().get(&key) {
            tracing::trace!(collection = %collection.name, "layout cache hit");
            return Ok(layout.clone());
        }

        let layout = Arc::new(CollectionLayout::compile(config, collection)?);
        tracing::debug!(collection = %collection.name, "compiled collection layout");
        self.inner.lock().put(key, layout.clone());
        Ok(layout)
    }

    /// Compiled layouts of every collection, in configuration order
    pub fn all(&self, config: &SiteConfig) -> Result<Vec<Arc<CollectionLayout>>> {
        config
            .collections
            .iter()
            .map(|c| self.get_or_compile(config, c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for LayoutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutCache")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectionFile, I18nConfig, I18nSetting};
    use rstest::rstest;
    use serde_json::json;

    fn i18n(structure: I18nStructure, omit: bool) -> ResolvedI18n {
        ResolvedI18n {
            structure: Some(structure),
            locales: vec!["en".into(), "ja".into()],
            default_locale: "en".into(),
            omit_default_locale_from_filename: omit,
            save_all_locales: true,
            canonical_slug_key: "translationKey".into(),
        }
    }

    fn posts() -> Collection {
        Collection {
            name: "posts".into(),
            folder: Some("content/posts".into()),
            ..Collection::default()
        }
    }

    #[rstest]
    #[case::none(None, false, "content/posts/hello.md", Some(("_default", "hello")))]
    #[case::none_nested(None, false, "content/posts/a/hello.md", None)]
    #[case::none_other_ext(None, false, "content/posts/hello.json", None)]
    #[case::files(Some(I18nStructure::MultipleFiles), false, "content/posts/hello.ja.md", Some(("ja", "hello")))]
    #[case::files_requires_locale(Some(I18nStructure::MultipleFiles), false, "content/posts/hello.md", None)]
    #[case::files_omitted_default(Some(I18nStructure::MultipleFiles), true, "content/posts/hello.md", Some(("en", "hello")))]
    #[case::files_unknown_locale(Some(I18nStructure::MultipleFiles), false, "content/posts/hello.fr.md", None)]
    #[case::folders(Some(I18nStructure::MultipleFolders), false, "content/posts/ja/hello.md", Some(("ja", "hello")))]
    #[case::root(Some(I18nStructure::MultipleFoldersI18nRoot), false, "en/content/posts/hello.md", Some(("en", "hello")))]
    #[case::index_excluded(None, false, "content/posts/_index.md", None)]
    fn matches_folder_paths(
        #[case] structure: Option<I18nStructure>,
        #[case] omit: bool,
        #[case] path: &str,
        #[case] expected: Option<(&str, &str)>,
    ) {
        let resolved = match structure {
            Some(s) => i18n(s, omit),
            None => ResolvedI18n::disabled(),
        };
        let layout = EntryLayout::for_folder(&posts(), resolved).unwrap();
        let found = layout
            .match_path(path)
            .map(|m| (m.locale, m.slug.unwrap_or_default()));
        assert_eq!(
            found,
            expected.map(|(l, s)| (l.to_string(), s.to_string()))
        );
    }

    #[rstest]
    #[case(None, "en", "content/posts/hello.md")]
    #[case(Some(I18nStructure::MultipleFiles), "ja", "content/posts/hello.ja.md")]
    #[case(Some(I18nStructure::MultipleFolders), "ja", "content/posts/ja/hello.md")]
    #[case(Some(I18nStructure::MultipleFoldersI18nRoot), "ja", "ja/content/posts/hello.md")]
    fn build_path_inverts_match(
        #[case] structure: Option<I18nStructure>,
        #[case] locale: &str,
        #[case] expected: &str,
    ) {
        let resolved = match structure {
            Some(s) => i18n(s, false),
            None => ResolvedI18n::disabled(),
        };
        let layout = EntryLayout::for_folder(&posts(), resolved).unwrap();
        let path = layout.build_path("hello", locale);
        assert_eq!(path, expected);
        assert_eq!(layout.match_path(&path).unwrap().subpath, "hello");
    }

    #[test]
    fn omitted_default_locale_path() {
        let layout =
            EntryLayout::for_folder(&posts(), i18n(I18nStructure::MultipleFiles, true)).unwrap();
        assert_eq!(layout.build_path("a", "en"), "content/posts/a.md");
        assert_eq!(layout.build_path("a", "ja"), "content/posts/a.ja.md");
    }

    #[test]
    fn path_template_captures_slug() {
        let collection = Collection {
            path: Some("{{year}}/{{slug}}".into()),
            ..posts()
        };
        let layout = EntryLayout::for_folder(&collection, ResolvedI18n::disabled()).unwrap();
        let found = layout.match_path("content/posts/2024/hello.md").unwrap();
        assert_eq!(found.slug.as_deref(), Some("hello"));
        assert_eq!(found.subpath, "2024/hello");
        assert!(layout.match_path("content/posts/hello.md").is_none());

        let content: ParsedContent = [("year".to_string(), json!(2025))].into_iter().collect();
        let subpath = layout.render_subpath("next", &content, "_default").unwrap();
        assert_eq!(subpath, "2025/next");
        assert!(layout.render_subpath("next", &ParsedContent::new(), "_default").is_err());
    }

    #[test]
    fn template_without_slug() {
        let collection = Collection {
            path: Some("{{fields.category}}/index".into()),
            ..posts()
        };
        let layout = EntryLayout::for_folder(&collection, ResolvedI18n::disabled()).unwrap();
        assert!(!layout.path_has_slug());
        let found = layout.match_path("content/posts/news/index.md").unwrap();
        assert_eq!(found.slug, None);
    }

    #[test]
    fn file_collection_layout() {
        let collection = Collection {
            name: "settings".into(),
            files: vec![CollectionFile {
                name: "general".into(),
                file: "data/general.json".into(),
                label: None,
            }],
            ..Collection::default()
        };
        let layout = EntryLayout::for_file(
            &collection,
            "general",
            i18n(I18nStructure::MultipleFiles, true),
        )
        .unwrap();
        assert_eq!(layout.build_path("general", "en"), "data/general.json");
        assert_eq!(layout.build_path("general", "ja"), "data/general.ja.json");
        let found = layout.match_path("data/general.ja.json").unwrap();
        assert_eq!(found.slug.as_deref(), Some("general"));
        assert_eq!(found.locale, "ja");
        assert_eq!(
            layout.encode_options().unwrap().format,
            Format::Json
        );
    }

    #[test]
    fn cache_reuses_and_keys_by_structure() {
        let mut config = SiteConfig {
            i18n: Some(I18nConfig {
                locales: vec!["en".into()],
                ..I18nConfig::default()
            }),
            collections: vec![posts()],
            ..SiteConfig::default()
        };
        let cache = LayoutCache::new(2);

        let first = cache.get_or_compile(&config, &config.collections[0]).unwrap();
        let again = cache.get_or_compile(&config, &config.collections[0]).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        config.collections[0].i18n = I18nSetting::Enabled(true);
        let changed = cache.get_or_compile(&config, &config.collections[0]).unwrap();
        assert!(!Arc::ptr_eq(&first, &changed));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let config = SiteConfig {
            collections: vec![
                posts(),
                Collection { name: "a".into(), folder: Some("a".into()), ..Collection::default() },
                Collection { name: "b".into(), folder: Some("b".into()), ..Collection::default() },
            ],
            ..SiteConfig::default()
        };
        let cache = LayoutCache::new(2);
        cache.all(&config).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
