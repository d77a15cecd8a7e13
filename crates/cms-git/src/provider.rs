//! Transport trait implemented by every repository backend

use std::collections::HashMap;

use async_trait::async_trait;

use crate::Result;
use crate::types::{ChangeOp, CommitResult, FileContent, LastCommit, RepositoryFile, RepositoryIdentity};

/// Host-specific access to one repository.
///
/// Implementations own request plumbing, timeouts and authentication; the
/// sync layer only relies on the shapes below.
#[async_trait]
pub trait Transport: Send + Sync {
    fn identity(&self) -> &RepositoryIdentity;

    /// Hash and message of the branch head
    async fn fetch_last_commit(&self) -> Result<LastCommit>;

    /// Every file in the tree at `last_hash`
    async fn fetch_file_list(&self, last_hash: &str) -> Result<Vec<RepositoryFile>>;

    /// Content and last-commit metadata keyed by path
    async fn fetch_file_contents(
        &self,
        files: &[RepositoryFile],
    ) -> Result<HashMap<String, FileContent>>;

    /// Apply `changes` as one commit on top of the branch head
    async fn commit(&self, changes: &[ChangeOp], message: &str) -> Result<CommitResult>;
}
