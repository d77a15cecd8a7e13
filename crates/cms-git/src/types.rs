//! Wire-agnostic data exchanged with a transport

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which repository a transport talks to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    /// Hosting service, e.g. `github` or `local`
    pub service: String,
    pub owner: String,
    pub repo: String,
}

impl RepositoryIdentity {
    pub fn new(
        service: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Persistent-state namespace: `service:owner/repo`
    pub fn namespace(&self) -> String {
        format!("{}:{}/{}", self.service, self.owner, self.repo)
    }
}

impl std::fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.namespace())
    }
}

/// One file in a repository listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFile {
    /// Repository-relative path with forward slashes
    pub path: String,
    /// Last path segment
    pub name: String,
    /// Content hash assigned by the repository
    pub sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl RepositoryFile {
    pub fn new(path: impl Into<String>, sha: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            path,
            name,
            sha: sha.into(),
            size: None,
            text: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Head commit of the synced branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCommit {
    pub hash: String,
    pub message: String,
}

/// Commit metadata of the last change to a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_date: Option<DateTime<Utc>>,
}

/// Fetched content of one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// UTF-8 text; absent for binary files
    pub text: Option<String>,
    pub size: Option<u64>,
    #[serde(default)]
    pub meta: FileMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
    Move,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Move => "move",
        };
        f.write_str(name)
    }
}

/// One file-level mutation in a commit.
///
/// `data` holds the final bytes for create/update. A move carries the bytes
/// of the file at its new path, or `None` to keep the old content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOp {
    pub action: ChangeAction,
    pub path: String,
    pub previous_path: Option<String>,
    pub data: Option<Vec<u8>>,
}

impl ChangeOp {
    pub fn create(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            action: ChangeAction::Create,
            path: path.into(),
            previous_path: None,
            data: Some(data.into()),
        }
    }

    pub fn update(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            action: ChangeAction::Update,
            path: path.into(),
            previous_path: None,
            data: Some(data.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Delete,
            path: path.into(),
            previous_path: None,
            data: None,
        }
    }

    pub fn moved(
        previous_path: impl Into<String>,
        path: impl Into<String>,
        data: Option<Vec<u8>>,
    ) -> Self {
        Self {
            action: ChangeAction::Move,
            path: path.into(),
            previous_path: Some(previous_path.into()),
            data,
        }
    }
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    pub hash: String,
    /// Content hash of every path written by the commit
    pub per_file_hash: HashMap<String, String>,
}
