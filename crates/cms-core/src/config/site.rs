//! Site configuration root

use std::collections::HashSet;
use std::path::Path;

use cms_fs::ConfigStore;
use cms_git::RepositoryIdentity;
use serde::{Deserialize, Serialize};

use super::collection::Collection;
use super::i18n::{I18nConfig, ResolvedI18n};
use crate::{Error, Result};

/// Repository backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Hosting service name, e.g. `github`
    pub name: String,
    /// `owner/name`
    pub repo: String,
    pub branch: Option<String>,
    /// Commit message prefix marking a commit that should not deploy
    pub skip_deploy_marker: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "github".to_string(),
            repo: String::new(),
            branch: None,
            skip_deploy_marker: "[skip ci]".to_string(),
        }
    }
}

/// Fetch and cache tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Content fetch batches in flight at once
    pub fetch_concurrency: usize,
    /// Files per content fetch request
    pub fetch_batch_size: usize,
    /// Total retry window for one batch, in milliseconds
    pub retry_max_elapsed_ms: u64,
    /// Compiled entry layouts kept in memory
    pub layout_cache_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fetch_concurrency: 4,
            fetch_batch_size: 50,
            retry_max_elapsed_ms: 10_000,
            layout_cache_capacity: 64,
        }
    }
}

/// Commit message templates.
///
/// Placeholders: `{{collection}}`, `{{slug}}`, `{{path}}`, `{{count}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitMessages {
    pub create: String,
    pub update: String,
    pub delete: String,
    pub delete_multiple: String,
    pub upload_media: String,
    pub upload_multiple_media: String,
    pub delete_media: String,
    pub delete_multiple_media: String,
}

impl Default for CommitMessages {
    fn default() -> Self {
        Self {
            create: "Create {{collection}} “{{slug}}”".to_string(),
            update: "Update {{collection}} “{{slug}}”".to_string(),
            delete: "Delete {{collection}} “{{slug}}”".to_string(),
            delete_multiple: "Delete {{count}} {{collection}} entries".to_string(),
            upload_media: "Upload “{{path}}”".to_string(),
            upload_multiple_media: "Upload {{count}} files".to_string(),
            delete_media: "Delete “{{path}}”".to_string(),
            delete_multiple_media: "Delete {{count}} files".to_string(),
        }
    }
}

/// Complete site configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub backend: BackendConfig,
    /// Global media folder, repository-relative
    pub media_folder: Option<String>,
    /// URL prefix of the media folder on the published site
    pub public_folder: Option<String>,
    pub i18n: Option<I18nConfig>,
    pub collections: Vec<Collection>,
    pub cache: CacheSettings,
    pub commit_messages: CommitMessages,
}

impl SiteConfig {
    /// Load and validate a TOML, JSON or YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = ConfigStore::new().load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_str_with_format(content: &str, extension: &str) -> Result<Self> {
        let config: Self = ConfigStore::new().load_str(content, extension)?;
        config.validate()?;
        Ok(config)
    }

    pub fn collection(&self, name: &str) -> Result<&Collection> {
        self.collections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::UnknownCollection {
                name: name.to_string(),
            })
    }

    /// Effective i18n rules of a collection
    pub fn resolve_i18n(&self, collection: &Collection) -> Result<ResolvedI18n> {
        ResolvedI18n::resolve(self.i18n.as_ref(), &collection.i18n).map_err(|e| match e {
            Error::InvalidConfig { message } => Error::invalid_config(format!(
                "collection '{}': {message}",
                collection.name
            )),
            other => other,
        })
    }

    /// Repository identity derived from the backend section
    pub fn identity(&self) -> Result<RepositoryIdentity> {
        let (owner, repo) = split_repo(&self.backend.repo)?;
        Ok(RepositoryIdentity::new(&self.backend.name, owner, repo))
    }

    /// Check cross-field rules serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !self.backend.repo.is_empty() {
            split_repo(&self.backend.repo)?;
        }

        if let Some(i18n) = &self.i18n
            && let Some(default) = &i18n.default_locale
            && !i18n.locales.contains(default)
        {
            return Err(Error::invalid_config(format!(
                "i18n default locale '{default}' is not in the locale list"
            )));
        }

        let mut names = HashSet::new();
        for collection in &self.collections {
            if collection.name.is_empty() {
                return Err(Error::invalid_config("collection without a name"));
            }
            if !names.insert(collection.name.as_str()) {
                return Err(Error::invalid_config(format!(
                    "duplicate collection name '{}'",
                    collection.name
                )));
            }
            match (&collection.folder, collection.files.is_empty()) {
                (None, true) => {
                    return Err(Error::invalid_config(format!(
                        "collection '{}' has neither a folder nor files",
                        collection.name
                    )));
                }
                (Some(_), false) => {
                    return Err(Error::invalid_config(format!(
                        "collection '{}' has both a folder and files",
                        collection.name
                    )));
                }
                _ => {}
            }
            let mut file_names = HashSet::new();
            for file in &collection.files {
                if !file_names.insert(file.name.as_str()) {
                    return Err(Error::invalid_config(format!(
                        "collection '{}' lists file '{}' twice",
                        collection.name, file.name
                    )));
                }
            }
            self.resolve_i18n(collection)?;
        }

        if self.cache.fetch_concurrency == 0 || self.cache.fetch_batch_size == 0 {
            return Err(Error::invalid_config(
                "fetch concurrency and batch size must be positive",
            ));
        }

        Ok(())
    }
}

fn split_repo(repo: &str) -> Result<(&str, &str)> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(Error::invalid_config(format!(
            "repo '{repo}' is not in owner/name form"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::I18nStructure;
    use rstest::rstest;

    const SITE: &str = r#"
backend:
  name: github
  repo: acme/site
media_folder: static/uploads
i18n:
  structure: multiple_files
  locales: [en, ja]
collections:
  - name: posts
    folder: content/posts
  - name: pages
    folder: content/pages
    i18n: true
  - name: settings
    files:
      - name: general
        file: data/general.json
"#;

    #[test]
    fn parses_yaml_site() {
        let config = SiteConfig::from_str_with_format(SITE, "yaml").unwrap();
        assert_eq!(config.collections.len(), 3);
        assert_eq!(config.identity().unwrap().namespace(), "github:acme/site");
        assert_eq!(config.cache.fetch_batch_size, 50);
        assert_eq!(config.backend.skip_deploy_marker, "[skip ci]");

        let pages = config.collection("pages").unwrap();
        let i18n = config.resolve_i18n(pages).unwrap();
        assert_eq!(i18n.structure, Some(I18nStructure::MultipleFiles));
        assert!(!config.resolve_i18n(config.collection("posts").unwrap()).unwrap().is_enabled());
    }

    #[rstest]
    #[case::duplicate_name(
        "collections:\n  - {name: a, folder: x}\n  - {name: a, folder: y}\n"
    )]
    #[case::no_location("collections:\n  - {name: a}\n")]
    #[case::bad_default_locale("i18n: {locales: [en], default_locale: fr}\n")]
    #[case::bad_repo("backend: {repo: no-slash}\n")]
    #[case::i18n_without_locales("collections:\n  - {name: a, folder: x, i18n: true}\n")]
    #[case::unknown_format("collections:\n  - {name: a, folder: x, format: ini}\n")]
    fn rejects_invalid_config(#[case] yaml: &str) {
        assert!(SiteConfig::from_str_with_format(yaml, "yaml").is_err());
    }

    #[test]
    fn unknown_collection() {
        let config = SiteConfig::default();
        assert!(matches!(
            config.collection("nope"),
            Err(Error::UnknownCollection { .. })
        ));
    }
}
