//! Shared test utilities for the content sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: throwaway git repositories driven through [`cms_git::LocalGitTransport`]
//! - [`transport`]: [`MockTransport`], an in-memory repository with call
//!   counters and failure injection

pub mod git;
pub mod transport;

pub use git::SiteRepo;
pub use transport::{CallCounts, MockTransport};
