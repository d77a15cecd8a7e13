//! Git repository fixtures.

use std::path::Path;

use cms_git::{ChangeOp, CommitResult, LocalGitTransport, Transport};
use tempfile::TempDir;

/// Initialises an empty bare repository.
///
/// # Panics
/// Panics if `git2::Repository::init_bare` fails.
pub fn bare_repo(path: &Path) -> git2::Repository {
    git2::Repository::init_bare(path).unwrap_or_else(|e| {
        panic!(
            "bare_repo: failed to init repository at {}: {e}",
            path.display()
        )
    })
}

/// A temporary bare repository with a transport pointed at it.
///
/// ```rust,no_run
/// # async fn demo() {
/// use cms_test_utils::SiteRepo;
///
/// let site = SiteRepo::new();
/// site.commit(&[("content/posts/a.md", "---\ntitle: A\n---\n")], "Seed").await;
/// # }
/// ```
pub struct SiteRepo {
    dir: TempDir,
    transport: LocalGitTransport,
}

impl Default for SiteRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteRepo {
    /// # Panics
    /// Panics if the repository cannot be created.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("SiteRepo::new: {e}"));
        bare_repo(dir.path());
        let transport = LocalGitTransport::open(dir.path())
            .unwrap_or_else(|e| panic!("SiteRepo::new: failed to open repository: {e}"))
            .with_author("Test Author", "author@example.com");
        Self { dir, transport }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A fresh transport handle, as another client would open it
    pub fn transport(&self) -> LocalGitTransport {
        self.transport.clone()
    }

    /// Commit text files on top of the head, as an outside writer.
    ///
    /// # Panics
    /// Panics if the commit fails.
    pub async fn commit(&self, files: &[(&str, &str)], message: &str) -> CommitResult {
        let changes: Vec<ChangeOp> = files
            .iter()
            .map(|(path, text)| ChangeOp::update(*path, *text))
            .collect();
        self.apply(&changes, message).await
    }

    /// Commit arbitrary changes as an outside writer.
    ///
    /// # Panics
    /// Panics if the commit fails.
    pub async fn apply(&self, changes: &[ChangeOp], message: &str) -> CommitResult {
        self.transport
            .commit(changes, message)
            .await
            .unwrap_or_else(|e| panic!("SiteRepo::apply: commit failed: {e}"))
    }
}
