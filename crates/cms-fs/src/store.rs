//! Persistent key-value stores for sync state
//!
//! A store holds JSON values under string keys. Batches passed to
//! [`KeyValueStore::set_many`] and [`KeyValueStore::delete_many`] are applied
//! atomically: a reader sees either none or all of a batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::io::{FileLock, read_text_if_exists, write_atomic};
use crate::{Error, Result};

/// Bucket holding scalar sync metadata
pub const META_BUCKET: &str = "meta";
/// Bucket holding one record per repository file
pub const FILE_CACHE_BUCKET: &str = "file-cache";

/// A bucket of JSON values keyed by string
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// All entries, in insertion order
    fn entries(&self) -> Result<Vec<(String, Value)>>;

    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()>;

    fn delete_many(&self, keys: &[String]) -> Result<()>;

    fn clear(&self) -> Result<()>;

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_many(vec![(key.to_string(), value)])
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|(k, _)| k).collect())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn entries(&self) -> Result<Vec<(String, Value)>> {
        Ok(self
            .data
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.data.lock().extend(entries);
        Ok(())
    }

    fn delete_many(&self, keys: &[String]) -> Result<()> {
        let mut data = self.data.lock();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.data.lock().clear();
        Ok(())
    }
}

/// Store backed by a single JSON document on disk.
///
/// Every mutation is a locked read-modify-write that replaces the document
/// atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        let Some(text) = read_text_if_exists(&self.path)? else {
            return Ok(Map::new());
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(Error::CorruptStore {
                path: self.path.clone(),
                message: "top-level value is not an object".to_string(),
            }),
            Err(e) => Err(Error::CorruptStore {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let _guard = self.guard.lock();
        let _lock = FileLock::exclusive(&self.path)?;
        let mut data = self.load()?;
        apply(&mut data);
        let bytes = serde_json::to_vec(&data)?;
        write_atomic(&self.path, &bytes)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    fn entries(&self) -> Result<Vec<(String, Value)>> {
        Ok(self.load()?.into_iter().collect())
    }

    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        tracing::trace!(path = %self.path.display(), count = entries.len(), "store write");
        self.update(|data| data.extend(entries))
    }

    fn delete_many(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        tracing::trace!(path = %self.path.display(), count = keys.len(), "store delete");
        self.update(|data| {
            for key in keys {
                data.remove(key);
            }
        })
    }

    fn clear(&self) -> Result<()> {
        self.update(|data| data.clear())
    }
}

/// Opens named buckets for a repository namespace
pub trait StoreProvider: Send + Sync {
    fn open(&self, namespace: &str, bucket: &str) -> Result<Arc<dyn KeyValueStore>>;
}

/// Provider handing out shared in-memory stores.
///
/// Opening the same namespace and bucket twice yields the same store.
#[derive(Default)]
pub struct MemoryStoreProvider {
    stores: Mutex<HashMap<(String, String), Arc<MemoryStore>>>,
}

impl MemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreProvider for MemoryStoreProvider {
    fn open(&self, namespace: &str, bucket: &str) -> Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = self
            .stores
            .lock()
            .entry((namespace.to_string(), bucket.to_string()))
            .or_default()
            .clone();
        Ok(store)
    }
}

/// Provider placing one JSON file per namespace and bucket under a root
/// directory: `<root>/<service>/<owner>/<repo>/<bucket>.json`.
#[derive(Debug, Clone)]
pub struct FileStoreProvider {
    root: PathBuf,
}

impl FileStoreProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Provider rooted in the user cache directory
    pub fn default_location() -> Option<Self> {
        dirs::cache_dir().map(|dir| Self::new(dir.join("content-sync")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, namespace: &str, bucket: &str) -> Result<PathBuf> {
        let invalid = || Error::InvalidNamespace {
            namespace: namespace.to_string(),
        };
        let segments: Vec<&str> = namespace.split([':', '/']).collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
        {
            return Err(invalid());
        }
        if bucket.is_empty() || bucket.contains(['/', '\\', ':']) {
            return Err(invalid());
        }

        let mut path = self.root.clone();
        path.extend(segments);
        Ok(path.join(format!("{bucket}.json")))
    }
}

impl StoreProvider for FileStoreProvider {
    fn open(&self, namespace: &str, bucket: &str) -> Result<Arc<dyn KeyValueStore>> {
        let path = self.bucket_path(namespace, bucket)?;
        tracing::debug!(path = %path.display(), "opening file store");
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(path));
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_provider_shares_buckets() {
        let provider = MemoryStoreProvider::new();
        let a = provider.open("github:o/r", META_BUCKET).unwrap();
        a.set("k", json!(1)).unwrap();
        let b = provider.open("github:o/r", META_BUCKET).unwrap();
        assert_eq!(b.get("k").unwrap(), Some(json!(1)));
        let other = provider.open("github:o/r", FILE_CACHE_BUCKET).unwrap();
        assert_eq!(other.get("k").unwrap(), None);
    }

    #[test]
    fn bucket_path_layout() {
        let provider = FileStoreProvider::new("/cache");
        assert_eq!(
            provider.bucket_path("github:owner/repo", "meta").unwrap(),
            PathBuf::from("/cache/github/owner/repo/meta.json")
        );
    }

    #[test]
    fn bucket_path_rejects_traversal() {
        let provider = FileStoreProvider::new("/cache");
        assert!(provider.bucket_path("github:../repo", "meta").is_err());
        assert!(provider.bucket_path("github:owner/repo", "../x").is_err());
        assert!(provider.bucket_path("github::repo", "meta").is_err());
    }
}
