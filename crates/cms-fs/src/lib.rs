//! Filesystem and persistence primitives for the content sync layer
//!
//! Provides repository-relative paths, content checksums, atomic file
//! writes, configuration loading and the key-value stores that back the
//! sync cache.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;
pub mod store;

pub use checksum::compute_content_checksum;
pub use config::ConfigStore;
pub use error::{Error, Result};
pub use path::RepoPath;
pub use store::{
    FILE_CACHE_BUCKET, FileStore, FileStoreProvider, KeyValueStore, META_BUCKET, MemoryStore,
    MemoryStoreProvider, StoreProvider,
};
