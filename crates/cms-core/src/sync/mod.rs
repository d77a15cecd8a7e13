//! Sync passes: the commit-gated file cache and the orchestrator driving it

pub mod cache;
pub mod orchestrator;

pub use cache::{CacheSync, CachedFile, SyncCache};
pub use orchestrator::{Snapshot, SyncOrchestrator, SyncReport};
