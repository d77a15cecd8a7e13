//! Site configuration
//!
//! The configuration is a serde model loaded from TOML, JSON or YAML. It
//! declares the repository backend, the content collections and their
//! locale layouts, cache tuning and commit message templates.
//!
//! # Example
//!
//! ```
//! use cms_core::config::SiteConfig;
//!
//! let config = SiteConfig::from_str_with_format(
//!     "collections:\n  - name: posts\n    folder: content/posts\n",
//!     "yaml",
//! )
//! .unwrap();
//! assert_eq!(config.collections[0].entry_extension(), "md");
//! ```

mod collection;
mod i18n;
mod site;

pub use collection::{Collection, CollectionFile, DelimiterSetting};
pub use i18n::{
    CanonicalSlug, DEFAULT_CANONICAL_SLUG_KEY, DEFAULT_LOCALE_KEY, I18nConfig, I18nOverride,
    I18nSetting, I18nStructure, ResolvedI18n,
};
pub use site::{BackendConfig, CacheSettings, CommitMessages, SiteConfig};
