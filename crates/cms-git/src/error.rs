//! Error types for cms-git

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a transport.
///
/// Every variant is fatal to the sync or commit pass that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository has no commits")]
    EmptyRepository,

    #[error("Branch '{name}' not found")]
    BranchNotFound { name: String },

    #[error("File '{path}' not found in repository")]
    FileNotFound { path: String },

    #[error("Invalid change for '{path}': {reason}")]
    InvalidChange { path: String, reason: String },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Remote request '{operation}' failed: {message}")]
    Remote { operation: String, message: String },
}

impl Error {
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
