//! Sync and commit driver for one repository

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use cms_content::decode_str;
use cms_fs::StoreProvider;
use cms_git::{ChangeAction, ChangeOp, CommitResult, LastCommit, RepositoryFile, Transport};

use crate::asset::Asset;
use crate::changeset::{BuildRequest, ChangeSetBuilder};
use crate::classify::{ClassifiedFile, CollectionContext, PathClassifier};
use crate::config::SiteConfig;
use crate::error::SyncWarning;
use crate::layout::LayoutCache;
use crate::reconcile::{Entry, ParsedEntryFile, assemble};
use crate::sync::cache::{CachedFile, SyncCache};
use crate::Result;

/// Published state of the last completed sync
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub entries: Vec<Entry>,
    pub assets: Vec<Asset>,
    pub config_files: Vec<RepositoryFile>,
    pub last_commit: Option<LastCommit>,
    pub deploy_skipped: bool,
    pub warnings: Vec<SyncWarning>,
}

impl Snapshot {
    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries of one collection
    pub fn collection(&self, name: &str) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(move |e| e.collection == name)
    }
}

/// Summary of one [`SyncOrchestrator::run_sync`] pass
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub last_commit: LastCommit,
    /// The remote listing was requested rather than rebuilt from the cache
    pub listed: bool,
    pub fetched: usize,
    pub removed: usize,
    pub entries: usize,
    pub assets: usize,
    pub warnings: Vec<SyncWarning>,
}

/// Drives sync and commit passes for one repository.
///
/// Passes are serialized; readers take the published [`Snapshot`] without
/// waiting for a pass in progress.
pub struct SyncOrchestrator {
    config: Arc<SiteConfig>,
    transport: Arc<dyn Transport>,
    cache: SyncCache,
    layouts: LayoutCache,
    lock: Mutex<()>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl SyncOrchestrator {
    pub fn new(
        config: Arc<SiteConfig>,
        transport: Arc<dyn Transport>,
        stores: &dyn StoreProvider,
    ) -> Result<Self> {
        config.validate()?;
        let cache = SyncCache::open(stores, transport.identity(), config.cache.clone())?;
        let layouts = LayoutCache::new(config.cache.layout_cache_capacity);
        Ok(Self {
            config,
            transport,
            cache,
            layouts,
            lock: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn cache(&self) -> &SyncCache {
        &self.cache
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Sync with the repository head and publish a new snapshot.
    ///
    /// Undecodable or unmergeable files end up in the report's warnings;
    /// transport and store failures abort the pass and keep the previous
    /// snapshot.
    pub async fn run_sync(&self) -> Result<SyncReport> {
        let _pass = self.lock.lock().await;

        let classifier = PathClassifier::new(&self.config, &self.layouts)?;
        let synced = self
            .cache
            .sync(
                self.transport.as_ref(),
                &classifier,
                &self.config.backend.skip_deploy_marker,
            )
            .await?;

        let mut warnings = Vec::new();
        let parsed = decode_entry_files(synced.files.entry_files, &mut warnings);
        let assembled = assemble(parsed);
        warnings.extend(assembled.warnings);

        let mut assets: Vec<Asset> = synced
            .files
            .asset_files
            .iter()
            .map(|f| {
                let collection = match &f.context {
                    CollectionContext::Asset { collection } => collection.clone(),
                    _ => None,
                };
                Asset::from_file(&f.file, collection)
            })
            .collect();
        assets.sort_by(|a, b| a.path.cmp(&b.path));

        let mut config_files: Vec<RepositoryFile> =
            synced.files.config_files.into_iter().map(|f| f.file).collect();
        config_files.sort_by(|a, b| a.path.cmp(&b.path));

        for warning in &warnings {
            tracing::warn!(path = %warning.path, kind = ?warning.kind, "{}", warning.message);
        }

        let report = SyncReport {
            last_commit: synced.last_commit.clone(),
            listed: synced.listed,
            fetched: synced.fetched,
            removed: synced.removed,
            entries: assembled.entries.len(),
            assets: assets.len(),
            warnings: warnings.clone(),
        };

        let snapshot = Snapshot {
            entries: assembled.entries,
            assets,
            config_files,
            last_commit: Some(synced.last_commit),
            deploy_skipped: synced.deploy_skipped,
            warnings,
        };
        *self.snapshot.write() = Arc::new(snapshot);

        tracing::info!(
            entries = report.entries,
            assets = report.assets,
            warnings = report.warnings.len(),
            "published snapshot"
        );
        Ok(report)
    }

    /// Build a change set, commit it, and record the written files in the
    /// cache so the next sync reuses them.
    ///
    /// Once the transport has accepted the commit its result is returned even
    /// if the cache update fails; the next sync then refetches those files.
    pub async fn run_commit(&self, request: &BuildRequest) -> Result<CommitResult> {
        let _pass = self.lock.lock().await;

        let set = ChangeSetBuilder::new(&self.config, &self.layouts).build(request)?;
        let result = self.transport.commit(&set.changes, &set.message).await?;
        tracing::info!(
            hash = %result.hash,
            changes = set.changes.len(),
            message = %set.message,
            "committed change set"
        );

        let recorded = self
            .cache_updates(&set.changes, &result.per_file_hash)
            .and_then(|(written, removed)| self.cache.record_commit(written, &removed));
        if let Err(e) = recorded {
            tracing::warn!(hash = %result.hash, error = %e, "commit not recorded in cache");
        }
        Ok(result)
    }

    fn cache_updates(
        &self,
        changes: &[ChangeOp],
        hashes: &HashMap<String, String>,
    ) -> Result<(Vec<(String, CachedFile)>, Vec<String>)> {
        let mut written = Vec::new();
        let mut removed = Vec::new();

        for change in changes {
            if let Some(previous) = &change.previous_path {
                removed.push(previous.clone());
            }
            if change.action == ChangeAction::Delete {
                removed.push(change.path.clone());
                continue;
            }
            let Some(sha) = hashes.get(&change.path) else {
                tracing::debug!(path = %change.path, "no content hash returned, not caching");
                continue;
            };

            let record = match &change.data {
                Some(data) => {
                    let text = String::from_utf8(data.clone()).ok();
                    CachedFile {
                        sha: sha.clone(),
                        size: Some(data.len() as u64),
                        binary: text.is_none(),
                        text,
                        meta: Default::default(),
                    }
                }
                None => {
                    let previous = match &change.previous_path {
                        Some(previous) => self.cache.cached_file(previous)?,
                        None => None,
                    };
                    CachedFile {
                        sha: sha.clone(),
                        ..previous.unwrap_or_default()
                    }
                }
            };
            written.push((change.path.clone(), record));
        }
        Ok((written, removed))
    }
}

/// Decode entry files, turning failures into warnings
fn decode_entry_files(
    files: Vec<ClassifiedFile>,
    warnings: &mut Vec<SyncWarning>,
) -> Vec<ParsedEntryFile> {
    let mut parsed = Vec::with_capacity(files.len());
    for classified in files {
        let CollectionContext::Entry(context) = classified.context else {
            continue;
        };
        let file = classified.file;
        let Some(text) = file.text.as_deref() else {
            warnings.push(SyncWarning::decode(&file.path, "content unavailable"));
            continue;
        };

        let decoded = decode_str(text, &context.layout.decode_options(&file.path));
        match decoded {
            Ok(content) => parsed.push(ParsedEntryFile {
                file,
                context,
                content,
            }),
            Err(e) => warnings.push(SyncWarning::decode(&file.path, e.to_string())),
        }
    }
    parsed
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("identity", self.transport.identity())
            .field("cache", &self.cache)
            .field("layouts", &self.layouts)
            .finish_non_exhaustive()
    }
}
