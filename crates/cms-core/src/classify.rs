//! Repository path classification
//!
//! Sorts a repository listing into entry files, asset files and recognized
//! git metadata files. A path is an entry when a collection layout matches
//! it; otherwise it is an asset when it lies in a media folder. Entry
//! matches take priority, and each path gets at most one kind.

use std::sync::Arc;

use cms_fs::RepoPath;
use cms_fs::checksum::compute_structural_checksum;
use cms_git::{FileMeta, RepositoryFile};

use crate::Result;
use crate::config::SiteConfig;
use crate::layout::{CollectionLayout, EntryLayout, LayoutCache};

/// Dotfiles kept as configuration files
pub const CONFIG_DOTFILES: [&str; 3] = [".gitattributes", ".gitignore", ".gitkeep"];

/// File stem some static site generators reserve for a folder's own page
pub const SPECIAL_INDEX_STEM: &str = "_index";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Entry,
    Asset,
    Config,
}

/// Collection and locale rules an entry file matched
#[derive(Debug, Clone)]
pub struct EntryContext {
    pub layout: Arc<EntryLayout>,
    pub locale: String,
    pub subpath: String,
    /// Slug carried by the path
    pub slug: Option<String>,
}

/// What a classified file belongs to
#[derive(Debug, Clone)]
pub enum CollectionContext {
    Entry(EntryContext),
    Asset {
        /// Owning collection, or `None` for the global media folder
        collection: Option<String>,
    },
    Config,
}

/// A repository file with its classification
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub file: RepositoryFile,
    pub context: CollectionContext,
    /// Last-commit metadata, filled in once content is fetched or restored
    pub meta: FileMeta,
}

impl ClassifiedFile {
    pub fn kind(&self) -> FileKind {
        match self.context {
            CollectionContext::Entry(_) => FileKind::Entry,
            CollectionContext::Asset { .. } => FileKind::Asset,
            CollectionContext::Config => FileKind::Config,
        }
    }

    pub fn entry_context(&self) -> Option<&EntryContext> {
        match &self.context {
            CollectionContext::Entry(context) => Some(context),
            _ => None,
        }
    }

    pub fn path(&self) -> &str {
        &self.file.path
    }
}

/// Classification result, each list in listing order
#[derive(Debug, Clone, Default)]
pub struct ClassifiedFiles {
    pub entry_files: Vec<ClassifiedFile>,
    pub asset_files: Vec<ClassifiedFile>,
    pub config_files: Vec<ClassifiedFile>,
}

impl ClassifiedFiles {
    pub fn len(&self) -> usize {
        self.entry_files.len() + self.asset_files.len() + self.config_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedFile> {
        self.entry_files
            .iter()
            .chain(&self.asset_files)
            .chain(&self.config_files)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClassifiedFile> {
        self.entry_files
            .iter_mut()
            .chain(&mut self.asset_files)
            .chain(&mut self.config_files)
    }

    fn push(&mut self, file: ClassifiedFile) {
        match file.kind() {
            FileKind::Entry => self.entry_files.push(file),
            FileKind::Asset => self.asset_files.push(file),
            FileKind::Config => self.config_files.push(file),
        }
    }
}

#[derive(Debug, Clone)]
enum MediaScope {
    /// The folder and all its subfolders
    Tree(RepoPath),
    /// Exactly this folder
    Exact(RepoPath),
    /// Any folder named `name` below `base`; empty `name` means `base` itself
    /// and every folder below it
    Relative { base: RepoPath, name: String },
}

#[derive(Debug, Clone)]
struct MediaRule {
    collection: Option<String>,
    scope: MediaScope,
}

impl MediaRule {
    fn contains(&self, path: &RepoPath) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        match &self.scope {
            MediaScope::Tree(dir) => parent.starts_with(dir),
            MediaScope::Exact(dir) => &parent == dir,
            MediaScope::Relative { base, name } => {
                if !path.starts_with(base) || path == base {
                    return false;
                }
                if name.is_empty() {
                    return true;
                }
                let rel = if parent == *base {
                    ""
                } else {
                    match parent.strip_dir(base) {
                        Some(rel) => rel,
                        None => return false,
                    }
                };
                rel == name || rel.ends_with(&format!("/{name}"))
            }
        }
    }
}

/// Classifies repository paths against a site configuration
#[derive(Debug)]
pub struct PathClassifier {
    layouts: Vec<Arc<CollectionLayout>>,
    media: Vec<MediaRule>,
    fingerprint: String,
}

impl PathClassifier {
    pub fn new(config: &SiteConfig, layouts: &LayoutCache) -> Result<Self> {
        let layouts = layouts.all(config)?;

        let mut media = Vec::new();
        for collection in &config.collections {
            let Some(folder) = &collection.media_folder else {
                continue;
            };
            let owner = Some(collection.name.clone());
            if let Some(absolute) = folder.strip_prefix('/') {
                media.push(MediaRule {
                    collection: owner,
                    scope: MediaScope::Exact(RepoPath::new(absolute)),
                });
                continue;
            }

            let name = RepoPath::new(folder).to_string();
            let bases: Vec<RepoPath> = match &collection.folder {
                Some(dir) => vec![RepoPath::new(dir)],
                None => collection
                    .files
                    .iter()
                    .filter_map(|f| RepoPath::new(&f.file).parent())
                    .collect(),
            };
            for base in bases {
                media.push(MediaRule {
                    collection: owner.clone(),
                    scope: MediaScope::Relative {
                        base,
                        name: name.clone(),
                    },
                });
            }
        }
        if let Some(folder) = &config.media_folder {
            media.push(MediaRule {
                collection: None,
                scope: MediaScope::Tree(RepoPath::new(folder)),
            });
        }

        let fingerprint =
            compute_structural_checksum(&(&config.collections, &config.media_folder, &config.i18n))?;

        Ok(Self {
            layouts,
            media,
            fingerprint,
        })
    }

    /// Stable hash of the rules; a change invalidates cached listings
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Classify one file; `None` for files the CMS does not manage
    pub fn classify_one(&self, file: RepositoryFile) -> Option<ClassifiedFile> {
        let path = RepoPath::new(&file.path);

        if path.is_hidden() {
            if CONFIG_DOTFILES.contains(&path.file_name()) {
                return Some(ClassifiedFile {
                    file,
                    context: CollectionContext::Config,
                    meta: FileMeta::default(),
                });
            }
            return None;
        }

        if let Some((layout, found)) = self
            .layouts
            .iter()
            .find_map(|collection| collection.match_path(path.as_str()))
        {
            return Some(ClassifiedFile {
                file,
                context: CollectionContext::Entry(EntryContext {
                    layout,
                    locale: found.locale,
                    subpath: found.subpath,
                    slug: found.slug,
                }),
                meta: FileMeta::default(),
            });
        }

        if path.stem() == SPECIAL_INDEX_STEM {
            return None;
        }

        let rule = self.media.iter().find(|rule| rule.contains(&path))?;
        Some(ClassifiedFile {
            file,
            context: CollectionContext::Asset {
                collection: rule.collection.clone(),
            },
            meta: FileMeta::default(),
        })
    }

    pub fn classify(&self, files: Vec<RepositoryFile>) -> ClassifiedFiles {
        let total = files.len();
        let mut out = ClassifiedFiles::default();
        for file in files {
            if let Some(classified) = self.classify_one(file) {
                out.push(classified);
            }
        }
        tracing::debug!(
            total,
            entries = out.entry_files.len(),
            assets = out.asset_files.len(),
            config = out.config_files.len(),
            "classified repository files"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Collection, CollectionFile};
    use pretty_assertions::assert_eq;

    fn config() -> SiteConfig {
        SiteConfig {
            media_folder: Some("static/uploads".into()),
            collections: vec![
                Collection {
                    name: "posts".into(),
                    folder: Some("content/posts".into()),
                    media_folder: Some("images".into()),
                    ..Collection::default()
                },
                Collection {
                    name: "docs".into(),
                    folder: Some("content/docs".into()),
                    media_folder: Some("/static/docs".into()),
                    ..Collection::default()
                },
                Collection {
                    name: "notes".into(),
                    folder: Some("content/notes".into()),
                    media_folder: Some(String::new()),
                    ..Collection::default()
                },
                Collection {
                    name: "settings".into(),
                    files: vec![CollectionFile {
                        name: "general".into(),
                        file: "data/general.yml".into(),
                        label: None,
                    }],
                    ..Collection::default()
                },
            ],
            ..SiteConfig::default()
        }
    }

    fn kind_of(classifier: &PathClassifier, path: &str) -> Option<(FileKind, Option<String>)> {
        classifier
            .classify_one(RepositoryFile::new(path, "sha"))
            .map(|c| {
                let owner = match &c.context {
                    CollectionContext::Entry(e) => Some(e.layout.collection().to_string()),
                    CollectionContext::Asset { collection } => collection.clone(),
                    CollectionContext::Config => None,
                };
                (c.kind(), owner)
            })
    }

    #[test]
    fn classifies_by_rules() {
        let classifier = PathClassifier::new(&config(), &LayoutCache::new(8)).unwrap();
        let posts = Some("posts".to_string());
        let cases = [
            ("content/posts/a.md", Some((FileKind::Entry, posts.clone()))),
            ("data/general.yml", Some((FileKind::Entry, Some("settings".into())))),
            ("content/posts/images/a.png", Some((FileKind::Asset, posts.clone()))),
            ("content/posts/2024/images/a.png", Some((FileKind::Asset, posts.clone()))),
            ("content/posts/a.png", None),
            ("static/docs/manual.pdf", Some((FileKind::Asset, Some("docs".into())))),
            ("static/docs/old/manual.pdf", None),
            ("content/notes/pic.jpg", Some((FileKind::Asset, Some("notes".into())))),
            ("content/notes/deep/pic.jpg", Some((FileKind::Asset, Some("notes".into())))),
            ("static/uploads/2024/b.png", Some((FileKind::Asset, None))),
            ("static/uploads/_index.md", None),
            ("content/posts/_index.md", None),
            ("README.md", None),
            (".gitignore", Some((FileKind::Config, None))),
            ("static/uploads/.gitkeep", Some((FileKind::Config, None))),
            (".github/workflows/ci.yml", None),
            ("content/posts/.draft.md", None),
        ];
        for (path, expected) in cases {
            assert_eq!(kind_of(&classifier, path), expected, "{path}");
        }
    }

    #[test]
    fn entry_takes_priority_over_asset() {
        let mut config = config();
        config.media_folder = Some("content".into());
        let classifier = PathClassifier::new(&config, &LayoutCache::new(8)).unwrap();
        assert_eq!(
            kind_of(&classifier, "content/posts/a.md").map(|k| k.0),
            Some(FileKind::Entry)
        );
        assert_eq!(
            kind_of(&classifier, "content/other/a.md").map(|k| k.0),
            Some(FileKind::Asset)
        );
    }

    #[test]
    fn fingerprint_tracks_rules() {
        let layouts = LayoutCache::new(8);
        let a = PathClassifier::new(&config(), &layouts).unwrap();
        let mut changed = config();
        changed.media_folder = None;
        let b = PathClassifier::new(&changed, &layouts).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            a.fingerprint(),
            PathClassifier::new(&config(), &layouts).unwrap().fingerprint()
        );
    }

    #[test]
    fn classify_splits_lists() {
        let classifier = PathClassifier::new(&config(), &LayoutCache::new(8)).unwrap();
        let files = ["content/posts/a.md", "static/uploads/x.png", ".gitattributes", "x.txt"]
            .into_iter()
            .map(|p| RepositoryFile::new(p, "s"))
            .collect();
        let out = classifier.classify(files);
        assert_eq!(out.entry_files.len(), 1);
        assert_eq!(out.asset_files.len(), 1);
        assert_eq!(out.config_files.len(), 1);
        assert_eq!(out.len(), 3);
    }
}
