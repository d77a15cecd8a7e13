//! Sync orchestration for file-backed content repositories
//!
//! This crate ties the Layer 0 crates together:
//!
//! - **Configuration**: collections, locale layouts, cache tuning and commit messages
//! - **Classification**: sorting a repository listing into entry, asset and config files
//! - **Sync cache**: commit-gated, content-addressed file cache with batched fetches
//! - **Reconciliation**: merging per-locale files into entries and splitting them back
//! - **Change sets**: turning edits into file operations and a commit message
//! - **Orchestrator**: one serialized sync/commit driver per repository
//!
//! # Architecture
//!
//! ```text
//!                 SyncOrchestrator
//!                        |
//!     +---------+--------+---------+-------------+
//!     |         |        |         |             |
//! classify  SyncCache reconcile changeset     layout
//!                        |
//!        +---------------+---------------+
//!        |               |               |
//!   cms-content        cms-fs         cms-git
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use cms_core::{SiteConfig, SyncOrchestrator};
//! use cms_fs::FileStoreProvider;
//! use cms_git::LocalGitTransport;
//!
//! async fn example() -> cms_core::Result<()> {
//!     let config = SiteConfig::load("site.yml".as_ref())?;
//!     let transport = LocalGitTransport::open("site-repo")?.with_identity(config.identity()?);
//!     let stores = FileStoreProvider::new("/tmp/content-sync");
//!     let orchestrator = SyncOrchestrator::new(Arc::new(config), Arc::new(transport), &stores)?;
//!
//!     let report = orchestrator.run_sync().await?;
//!     for warning in &report.warnings {
//!         eprintln!("{warning}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod asset;
pub mod changeset;
pub mod classify;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod reconcile;
pub mod slug;
pub mod sync;

pub use asset::{Asset, AssetKind};
pub use changeset::{
    AssetEdit, BuildRequest, ChangeSet, ChangeSetBuilder, CommitKind, EntryEdit, commit_message,
};
pub use classify::{
    ClassifiedFile, ClassifiedFiles, CollectionContext, EntryContext, FileKind, PathClassifier,
};
pub use config::{Collection, I18nConfig, I18nStructure, SiteConfig};
pub use error::{Error, Result, SyncWarning, WarningKind};
pub use layout::{CollectionLayout, EntryLayout, LayoutCache};
pub use reconcile::{Entry, LocalizedRecord, assemble, disassemble};
pub use sync::{CachedFile, Snapshot, SyncCache, SyncOrchestrator, SyncReport};
