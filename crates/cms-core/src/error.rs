//! Error types for cms-core

use serde::{Deserialize, Serialize};

/// Result type for cms-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a sync or commit pass
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Site configuration failed validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A collection name that the configuration does not define
    #[error("Unknown collection '{name}'")]
    UnknownCollection { name: String },

    /// A path or slug template could not be compiled
    #[error("Invalid layout for collection '{collection}': {message}")]
    Layout { collection: String, message: String },

    /// An edit cannot be turned into file changes
    #[error("Invalid edit: {message}")]
    InvalidEdit { message: String },

    /// Entry content could not be serialized for a commit
    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: cms_content::Error,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    // Transparent wrappers for underlying crate errors
    /// Remote or local repository access failed
    #[error(transparent)]
    Transport(#[from] cms_git::Error),

    #[error(transparent)]
    Content(#[from] cms_content::Error),

    /// Persistent store or config file error
    #[error(transparent)]
    Fs(#[from] cms_fs::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn invalid_edit(message: impl Into<String>) -> Self {
        Self::InvalidEdit {
            message: message.into(),
        }
    }
}

/// Category of a non-fatal, per-file problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    /// File bytes do not match the declared or inferred format
    Decode,
    /// File could not be merged into an entry
    Reconcile,
}

/// A file excluded from the published set, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWarning {
    pub path: String,
    pub kind: WarningKind,
    pub message: String,
}

impl SyncWarning {
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: WarningKind::Decode,
            message: message.into(),
        }
    }

    pub fn reconcile(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: WarningKind::Reconcile,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            WarningKind::Decode => "decode",
            WarningKind::Reconcile => "reconcile",
        };
        write!(f, "{} ({kind}): {}", self.path, self.message)
    }
}
