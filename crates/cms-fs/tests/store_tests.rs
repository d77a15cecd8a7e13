//! Behaviour shared by every key-value store implementation

use std::sync::Arc;

use cms_fs::{FileStore, FileStoreProvider, KeyValueStore, MemoryStore, StoreProvider};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

enum Backend {
    Memory,
    File,
}

fn open(backend: Backend) -> (Arc<dyn KeyValueStore>, Option<TempDir>) {
    match backend {
        Backend::Memory => (Arc::new(MemoryStore::new()), None),
        Backend::File => {
            let dir = TempDir::new().unwrap();
            let store = FileStore::open(dir.path().join("bucket.json"));
            (Arc::new(store), Some(dir))
        }
    }
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::file(Backend::File)]
fn set_get_delete(#[case] backend: Backend) {
    let (store, _dir) = open(backend);

    assert_eq!(store.get("missing").unwrap(), None);

    store
        .set_many(vec![
            ("a".to_string(), json!({"sha": "1"})),
            ("b".to_string(), json!({"sha": "2"})),
            ("c".to_string(), json!(null)),
        ])
        .unwrap();
    assert_eq!(store.get("a").unwrap(), Some(json!({"sha": "1"})));
    assert_eq!(store.keys().unwrap(), vec!["a", "b", "c"]);

    store.delete_many(&["a".to_string(), "zzz".to_string()]).unwrap();
    assert_eq!(store.keys().unwrap(), vec!["b", "c"]);

    store.set("b", json!({"sha": "3"})).unwrap();
    assert_eq!(store.get("b").unwrap(), Some(json!({"sha": "3"})));

    store.clear().unwrap();
    assert!(store.entries().unwrap().is_empty());
}

#[test]
fn file_store_persists_across_handles() {
    let dir = TempDir::new().unwrap();
    let provider = FileStoreProvider::new(dir.path());

    provider
        .open("local:me/site", "meta")
        .unwrap()
        .set("last_commit_hash", json!("abc"))
        .unwrap();

    let reopened = provider.open("local:me/site", "meta").unwrap();
    assert_eq!(reopened.get("last_commit_hash").unwrap(), Some(json!("abc")));
    assert!(dir.path().join("local/me/site/meta.json").exists());
}

#[test]
fn corrupt_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bucket.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = FileStore::open(&path);
    assert!(matches!(
        store.get("x"),
        Err(cms_fs::Error::CorruptStore { .. })
    ));
}
