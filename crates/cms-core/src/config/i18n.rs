//! Internationalization settings
//!
//! The global `i18n` section sets defaults; each collection opts in with
//! `i18n: true` or overrides individual fields with an object.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Locale code used for collections without i18n
pub const DEFAULT_LOCALE_KEY: &str = "_default";

/// Field used to merge locale files when no key is configured
pub const DEFAULT_CANONICAL_SLUG_KEY: &str = "translationKey";

/// How a collection's locales map onto files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum I18nStructure {
    /// All locales in one file, keyed by locale code
    SingleFile,
    /// One file per locale with a locale suffix: `about.ja.md`
    #[default]
    MultipleFiles,
    /// One file per locale under a locale folder inside the collection
    MultipleFolders,
    /// One file per locale under a locale folder at the repository root
    MultipleFoldersI18nRoot,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalSlug {
    pub key: String,
}

impl Default for CanonicalSlug {
    fn default() -> Self {
        Self {
            key: DEFAULT_CANONICAL_SLUG_KEY.to_string(),
        }
    }
}

/// Global `i18n` section
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    pub structure: I18nStructure,
    pub locales: Vec<String>,
    /// Defaults to the first entry of `locales`
    pub default_locale: Option<String>,
    pub omit_default_locale_from_filename: bool,
    pub save_all_locales: bool,
    pub canonical_slug: CanonicalSlug,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            structure: I18nStructure::default(),
            locales: Vec::new(),
            default_locale: None,
            omit_default_locale_from_filename: false,
            save_all_locales: true,
            canonical_slug: CanonicalSlug::default(),
        }
    }
}

/// Collection-level fields merged over the global section
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nOverride {
    pub structure: Option<I18nStructure>,
    pub locales: Option<Vec<String>>,
    pub default_locale: Option<String>,
    pub omit_default_locale_from_filename: Option<bool>,
    pub save_all_locales: Option<bool>,
    pub canonical_slug: Option<CanonicalSlug>,
}

/// Collection `i18n` value: a switch or an override object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum I18nSetting {
    Enabled(bool),
    Override(I18nOverride),
}

impl Default for I18nSetting {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl I18nSetting {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }
}

/// Effective locale rules of one collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedI18n {
    /// `None` when the collection is not localized
    pub structure: Option<I18nStructure>,
    pub locales: Vec<String>,
    pub default_locale: String,
    pub omit_default_locale_from_filename: bool,
    pub save_all_locales: bool,
    pub canonical_slug_key: String,
}

impl ResolvedI18n {
    /// Rules for a collection without i18n
    pub fn disabled() -> Self {
        Self {
            structure: None,
            locales: vec![DEFAULT_LOCALE_KEY.to_string()],
            default_locale: DEFAULT_LOCALE_KEY.to_string(),
            omit_default_locale_from_filename: false,
            save_all_locales: true,
            canonical_slug_key: DEFAULT_CANONICAL_SLUG_KEY.to_string(),
        }
    }

    /// Merge a collection setting over the global section
    pub fn resolve(global: Option<&I18nConfig>, setting: &I18nSetting) -> Result<Self> {
        if !setting.is_enabled() {
            return Ok(Self::disabled());
        }
        let base = global.cloned().unwrap_or_default();

        let merged = match setting {
            I18nSetting::Override(o) => I18nConfig {
                structure: o.structure.unwrap_or(base.structure),
                locales: o.locales.clone().unwrap_or(base.locales),
                default_locale: o.default_locale.clone().or(base.default_locale),
                omit_default_locale_from_filename: o
                    .omit_default_locale_from_filename
                    .unwrap_or(base.omit_default_locale_from_filename),
                save_all_locales: o.save_all_locales.unwrap_or(base.save_all_locales),
                canonical_slug: o.canonical_slug.clone().unwrap_or(base.canonical_slug),
            },
            I18nSetting::Enabled(_) => base,
        };

        if merged.locales.is_empty() {
            return Err(Error::invalid_config(
                "i18n is enabled but no locales are configured",
            ));
        }
        let default_locale = match merged.default_locale {
            Some(locale) if merged.locales.contains(&locale) => locale,
            Some(locale) => {
                return Err(Error::invalid_config(format!(
                    "default locale '{locale}' is not in the locale list"
                )));
            }
            None => merged.locales[0].clone(),
        };

        Ok(Self {
            structure: Some(merged.structure),
            locales: merged.locales,
            default_locale,
            omit_default_locale_from_filename: merged.omit_default_locale_from_filename,
            save_all_locales: merged.save_all_locales,
            canonical_slug_key: merged.canonical_slug.key,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.structure.is_some()
    }

    /// Whether locale files merge by canonical slug
    pub fn merges_by_canonical_slug(&self) -> bool {
        matches!(
            self.structure,
            Some(
                I18nStructure::MultipleFiles
                    | I18nStructure::MultipleFolders
                    | I18nStructure::MultipleFoldersI18nRoot
            )
        )
    }
}
