//! Error types for cms-fs

use std::path::PathBuf;

/// Result type for cms-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cms-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Store at {path} is corrupt: {message}")]
    CorruptStore { path: PathBuf, message: String },

    #[error("Invalid store namespace '{namespace}'")]
    InvalidNamespace { namespace: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
