//! Error types for cms-content

/// Result type for cms-content operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cms-content operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse {format} content: {message}")]
    ParseError { format: String, message: String },

    #[error("Failed to serialize {format} content: {message}")]
    SerializeError { format: String, message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Content is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Invalid flattened key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

impl Error {
    pub fn parse(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn serialize(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SerializeError {
            format: format.into(),
            message: message.into(),
        }
    }
}
