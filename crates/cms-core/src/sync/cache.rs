//! Commit-gated, content-addressed file cache
//!
//! Two buckets per repository namespace:
//!
//! | Bucket       | Keys                                                                 |
//! |--------------|----------------------------------------------------------------------|
//! | `meta`       | `last_commit_hash`, `config_files_fetched`, `classifier_fingerprint` |
//! | `file-cache` | repository path → [`CachedFile`]                                     |
//!
//! A sync pass skips the remote listing when the head commit, the
//! classification rules and the fetched flag all match and the file cache
//! is non-empty. Cached content is reused only on an exact `sha` match.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cms_fs::{FILE_CACHE_BUCKET, KeyValueStore, META_BUCKET, StoreProvider};
use cms_git::{FileContent, FileMeta, LastCommit, RepositoryFile, RepositoryIdentity, Transport};

use crate::Result;
use crate::classify::{ClassifiedFiles, FileKind, PathClassifier};
use crate::config::CacheSettings;

pub const LAST_COMMIT_HASH_KEY: &str = "last_commit_hash";
pub const CONFIG_FILES_FETCHED_KEY: &str = "config_files_fetched";
pub const CLASSIFIER_FINGERPRINT_KEY: &str = "classifier_fingerprint";

const RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(100);

/// One `file-cache` record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFile {
    pub sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub meta: FileMeta,
    /// Content was fetched but is not valid UTF-8
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub binary: bool,
}

impl CachedFile {
    fn to_repository_file(&self, path: &str) -> RepositoryFile {
        RepositoryFile {
            size: self.size,
            text: self.text.clone(),
            ..RepositoryFile::new(path, &self.sha)
        }
    }
}

/// Result of [`SyncCache::sync`]
#[derive(Debug, Clone)]
pub struct CacheSync {
    pub files: ClassifiedFiles,
    pub last_commit: LastCommit,
    /// The head commit message starts with the skip-deploy marker
    pub deploy_skipped: bool,
    /// The remote listing was requested
    pub listed: bool,
    /// Files whose content came from the transport this pass
    pub fetched: usize,
    /// Cache records removed because their paths left the listing
    pub removed: usize,
}

/// Persistent cache for one repository
pub struct SyncCache {
    meta: Arc<dyn KeyValueStore>,
    files: Arc<dyn KeyValueStore>,
    settings: CacheSettings,
}

impl SyncCache {
    pub fn open(
        provider: &dyn StoreProvider,
        identity: &RepositoryIdentity,
        settings: CacheSettings,
    ) -> Result<Self> {
        let namespace = identity.namespace();
        Ok(Self {
            meta: provider.open(&namespace, META_BUCKET)?,
            files: provider.open(&namespace, FILE_CACHE_BUCKET)?,
            settings,
        })
    }

    /// Head commit hash recorded by the last completed sync
    pub fn last_commit_hash(&self) -> Result<Option<String>> {
        Ok(self
            .meta
            .get(LAST_COMMIT_HASH_KEY)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub fn cached_file(&self, path: &str) -> Result<Option<CachedFile>> {
        match self.files.get(path)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Every cached record keyed by path. Unreadable records are skipped.
    pub fn cached_files(&self) -> Result<HashMap<String, CachedFile>> {
        Ok(self.read_records()?.0)
    }

    /// Readable records, plus the keys of records that failed to deserialize
    fn read_records(&self) -> Result<(HashMap<String, CachedFile>, Vec<String>)> {
        let mut records = HashMap::new();
        let mut unreadable = Vec::new();
        for (path, value) in self.files.entries()? {
            match serde_json::from_value::<CachedFile>(value) {
                Ok(file) => {
                    records.insert(path, file);
                }
                Err(e) => {
                    tracing::warn!(%path, error = %e, "ignoring unreadable cache record");
                    unreadable.push(path);
                }
            }
        }
        Ok((records, unreadable))
    }

    /// Bring the cache up to date with the repository head.
    ///
    /// Transport failures abort before any cache write.
    pub async fn sync(
        &self,
        transport: &dyn Transport,
        classifier: &PathClassifier,
        skip_marker: &str,
    ) -> Result<CacheSync> {
        let last_commit = transport.fetch_last_commit().await?;
        let (cached, unreadable) = self.read_records()?;

        let gate_open = unreadable.is_empty()
            && self.gate_open(&last_commit.hash, classifier.fingerprint(), &cached)?;
        let listing: Vec<RepositoryFile> = if gate_open {
            tracing::debug!(
                hash = %last_commit.hash,
                files = cached.len(),
                "commit unchanged, rebuilding from cache"
            );
            cached
                .iter()
                .map(|(path, file)| file.to_repository_file(path))
                .collect()
        } else {
            tracing::debug!(hash = %last_commit.hash, "listing repository files");
            transport.fetch_file_list(&last_commit.hash).await?
        };

        let mut files = classifier.classify(listing);

        let mut fetching = Vec::new();
        let mut writes: Vec<(String, Value)> = Vec::new();
        for file in files.iter_mut() {
            let hit = cached.get(file.path()).filter(|c| c.sha == file.file.sha);
            match (file.kind(), hit) {
                (FileKind::Asset, Some(hit)) => {
                    file.meta = hit.meta.clone();
                }
                (FileKind::Asset, None) => {
                    let record = CachedFile {
                        sha: file.file.sha.clone(),
                        size: file.file.size,
                        ..CachedFile::default()
                    };
                    writes.push((file.path().to_string(), serde_json::to_value(&record)?));
                }
                (_, Some(hit)) if hit.text.is_some() || hit.binary => {
                    file.file.text = hit.text.clone();
                    file.file.size = file.file.size.or(hit.size);
                    file.meta = hit.meta.clone();
                }
                _ => fetching.push(file.file.clone()),
            }
        }

        let fetched = self.fetch_contents(transport, &fetching).await?;
        let fetched_count = fetched.len();
        for file in files.iter_mut() {
            let Some(content) = fetched.get(file.path()) else {
                continue;
            };
            file.file.text = content.text.clone();
            file.file.size = content.size.or(file.file.size);
            file.meta = content.meta.clone();
            let record = CachedFile {
                sha: file.file.sha.clone(),
                size: file.file.size,
                text: content.text.clone(),
                meta: content.meta.clone(),
                binary: content.text.is_none(),
            };
            writes.push((file.path().to_string(), serde_json::to_value(&record)?));
        }

        let live: HashSet<&str> = files.iter().map(|f| f.path()).collect();
        let stale: Vec<String> = cached
            .keys()
            .chain(&unreadable)
            .filter(|path| !live.contains(path.as_str()))
            .cloned()
            .collect();

        if !writes.is_empty() {
            self.files.set_many(writes)?;
        }
        if !stale.is_empty() {
            tracing::debug!(removed = stale.len(), "removing stale cache records");
            self.files.delete_many(&stale)?;
        }
        self.meta.set_many(vec![
            (LAST_COMMIT_HASH_KEY.to_string(), Value::from(last_commit.hash.clone())),
            (CONFIG_FILES_FETCHED_KEY.to_string(), Value::Bool(true)),
            (
                CLASSIFIER_FINGERPRINT_KEY.to_string(),
                Value::from(classifier.fingerprint()),
            ),
        ])?;

        let deploy_skipped = !skip_marker.is_empty() && last_commit.message.starts_with(skip_marker);
        tracing::info!(
            hash = %last_commit.hash,
            listed = !gate_open,
            fetched = fetched_count,
            removed = stale.len(),
            "cache synced"
        );
        Ok(CacheSync {
            files,
            last_commit,
            deploy_skipped,
            listed: !gate_open,
            fetched: fetched_count,
            removed: stale.len(),
        })
    }

    /// Record files written and removed by a commit
    pub fn record_commit(
        &self,
        written: Vec<(String, CachedFile)>,
        removed: &[String],
    ) -> Result<()> {
        if !written.is_empty() {
            let entries = written
                .into_iter()
                .map(|(path, file)| Ok((path, serde_json::to_value(file)?)))
                .collect::<Result<Vec<_>>>()?;
            self.files.set_many(entries)?;
        }
        if !removed.is_empty() {
            self.files.delete_many(removed)?;
        }
        Ok(())
    }

    /// Forget everything cached for this repository
    pub fn clear(&self) -> Result<()> {
        self.files.clear()?;
        self.meta.clear()?;
        Ok(())
    }

    fn gate_open(
        &self,
        hash: &str,
        fingerprint: &str,
        cached: &HashMap<String, CachedFile>,
    ) -> Result<bool> {
        if cached.is_empty() {
            return Ok(false);
        }
        let same_hash = self.last_commit_hash()?.as_deref() == Some(hash);
        let fetched = self
            .meta
            .get(CONFIG_FILES_FETCHED_KEY)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let same_rules = self
            .meta
            .get(CLASSIFIER_FINGERPRINT_KEY)?
            .is_some_and(|v| v.as_str() == Some(fingerprint));
        Ok(same_hash && fetched && same_rules)
    }

    /// Fetch content in bounded, retried batches. Either every batch
    /// succeeds or nothing is returned.
    async fn fetch_contents(
        &self,
        transport: &dyn Transport,
        files: &[RepositoryFile],
    ) -> Result<HashMap<String, FileContent>> {
        if files.is_empty() {
            return Ok(HashMap::new());
        }
        let batch_size = self.settings.fetch_batch_size.max(1);
        let concurrency = self.settings.fetch_concurrency.max(1);
        let max_elapsed = Duration::from_millis(self.settings.retry_max_elapsed_ms);
        tracing::debug!(
            files = files.len(),
            batches = files.len().div_ceil(batch_size),
            concurrency,
            "fetching file contents"
        );

        let batches: Vec<HashMap<String, FileContent>> = stream::iter(files.chunks(batch_size))
            .map(|batch| fetch_batch(transport, batch, max_elapsed))
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }
}

async fn fetch_batch(
    transport: &dyn Transport,
    batch: &[RepositoryFile],
    max_elapsed: Duration,
) -> Result<HashMap<String, FileContent>> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(RETRY_INITIAL_INTERVAL)
        .with_max_elapsed_time(Some(max_elapsed))
        .build();

    let contents = backoff::future::retry(policy, || async move {
        transport.fetch_file_contents(batch).await.map_err(|e| {
            tracing::warn!(files = batch.len(), error = %e, "content fetch failed, retrying");
            backoff::Error::transient(e)
        })
    })
    .await?;
    Ok(contents)
}

impl std::fmt::Debug for SyncCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCache")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
