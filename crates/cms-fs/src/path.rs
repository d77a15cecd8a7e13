//! Repository-relative paths
//!
//! Every path exchanged with a transport is relative to the repository root
//! and uses forward slashes, regardless of platform.

use serde::{Deserialize, Serialize};

/// A normalized, repository-relative path.
///
/// Backslashes become forward slashes, leading `./` and `/` are removed,
/// and empty or `.` segments are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RepoPath {
    inner: String,
}

impl RepoPath {
    pub fn new(path: impl AsRef<str>) -> Self {
        let replaced = path.as_ref().replace('\\', "/");
        let inner = replaced
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>()
            .join("/");
        Self { inner }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// True for the repository root
    pub fn is_root(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|s| !s.is_empty())
    }

    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            return Self::new(segment);
        }
        Self::new(format!("{}/{}", self.inner, segment))
    }

    /// Parent directory; the root has no parent
    pub fn parent(&self) -> Option<Self> {
        if self.inner.is_empty() {
            return None;
        }
        Some(match self.inner.rfind('/') {
            Some(idx) => Self {
                inner: self.inner[..idx].to_string(),
            },
            None => Self {
                inner: String::new(),
            },
        })
    }

    pub fn file_name(&self) -> &str {
        self.inner.rsplit('/').next().unwrap_or_default()
    }

    /// Extension of the file name, without the dot.
    ///
    /// Dotfiles such as `.gitignore` have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    /// File name without its last extension
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// The remainder of this path below `dir`, if it lies inside it.
    ///
    /// An empty `dir` is the repository root, which contains every path.
    pub fn strip_dir(&self, dir: &RepoPath) -> Option<&str> {
        if dir.is_root() {
            return Some(&self.inner);
        }
        self.inner
            .strip_prefix(dir.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Whether this path is `dir` itself or lies below it
    pub fn starts_with(&self, dir: &RepoPath) -> bool {
        self == dir || self.strip_dir(dir).is_some()
    }

    /// True if any segment starts with a dot
    pub fn is_hidden(&self) -> bool {
        self.segments().any(|segment| segment.starts_with('.'))
    }

    /// Reject paths that would escape the repository root
    pub fn is_safe(&self) -> bool {
        !self.is_root() && self.segments().all(|segment| segment != "..")
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

impl From<&str> for RepoPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RepoPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.inner
    }
}
