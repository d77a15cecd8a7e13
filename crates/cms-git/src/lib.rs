//! Repository transport layer
//!
//! Defines the [`Transport`] contract the sync layer consumes and a
//! [`LocalGitTransport`] implementation over a git repository on disk.
//! Hosted-service transports implement the same trait.

pub mod error;
pub mod local;
pub mod provider;
pub mod types;

pub use error::{Error, Result};
pub use local::LocalGitTransport;
pub use provider::Transport;
pub use types::{
    ChangeAction, ChangeOp, CommitResult, FileContent, FileMeta, LastCommit, RepositoryFile,
    RepositoryIdentity,
};
