//! Transport over a git repository on the local filesystem
//!
//! The repository is treated like a remote: reads come from the object
//! database and commits are written straight to the branch ref without
//! touching any working tree, so a bare repository is the natural target.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use git2::{
    Commit, Index, IndexEntry, IndexTime, Oid, Repository, Signature, Sort, TreeWalkMode,
    TreeWalkResult,
};

use crate::provider::Transport;
use crate::types::{
    ChangeAction, ChangeOp, CommitResult, FileContent, FileMeta, LastCommit, RepositoryFile,
    RepositoryIdentity,
};
use crate::{Error, Result};

/// Commits inspected when looking up per-file metadata
const DEFAULT_META_DEPTH: usize = 1000;

const BLOB_MODE: u32 = 0o100644;

/// Git transport backed by `git2`.
///
/// `git2::Repository` is not `Sync`, so each operation opens the repository
/// inside a blocking task.
#[derive(Debug, Clone)]
pub struct LocalGitTransport {
    path: PathBuf,
    identity: RepositoryIdentity,
    branch: Option<String>,
    author_name: String,
    author_email: String,
    meta_depth: usize,
}

impl LocalGitTransport {
    /// Transport for the repository at `path`, following `HEAD`.
    ///
    /// The identity is `local:<parent dir>/<dir>`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        Repository::open(&path)?;

        let component = |p: Option<&Path>| {
            p.and_then(Path::file_name)
                .map(|n| n.to_string_lossy().trim_end_matches(".git").to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "local".to_string())
        };
        let identity = RepositoryIdentity::new(
            "local",
            component(path.parent()),
            component(Some(path.as_path())),
        );

        Ok(Self {
            path,
            identity,
            branch: None,
            author_name: "Content Sync".to_string(),
            author_email: "content-sync@localhost".to_string(),
            meta_depth: DEFAULT_META_DEPTH,
        })
    }

    pub fn with_identity(mut self, identity: RepositoryIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Sync and commit against `refs/heads/<branch>` instead of `HEAD`
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    pub fn with_meta_depth(mut self, depth: usize) -> Self {
        self.meta_depth = depth;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ref_name(&self) -> String {
        match &self.branch {
            Some(branch) => format!("refs/heads/{branch}"),
            None => "HEAD".to_string(),
        }
    }

    async fn with_repo<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Repository, &Self) -> Result<T> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&this.path)?;
            f(&repo, &this)
        })
        .await?
    }

    /// Commit at the synced ref, `None` while the branch is unborn
    fn tip<'r>(&self, repo: &'r Repository) -> Result<Option<Commit<'r>>> {
        let reference = match &self.branch {
            Some(branch) => match repo.find_reference(&format!("refs/heads/{branch}")) {
                Ok(r) => r,
                Err(e) if e.code() == git2::ErrorCode::NotFound => {
                    if repo.is_empty()? {
                        return Ok(None);
                    }
                    return Err(Error::BranchNotFound {
                        name: branch.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
            },
            None => match repo.head() {
                Ok(r) => r,
                Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
                Err(e) => return Err(e.into()),
            },
        };
        Ok(Some(reference.peel_to_commit()?))
    }
}

#[async_trait]
impl Transport for LocalGitTransport {
    fn identity(&self) -> &RepositoryIdentity {
        &self.identity
    }

    async fn fetch_last_commit(&self) -> Result<LastCommit> {
        self.with_repo(|repo, this| {
            let commit = this.tip(repo)?.ok_or(Error::EmptyRepository)?;
            Ok(LastCommit {
                hash: commit.id().to_string(),
                message: commit.message().unwrap_or_default().to_string(),
            })
        })
        .await
    }

    async fn fetch_file_list(&self, last_hash: &str) -> Result<Vec<RepositoryFile>> {
        let last_hash = last_hash.to_string();
        self.with_repo(move |repo, this| {
            let commit = if last_hash.is_empty() {
                this.tip(repo)?.ok_or(Error::EmptyRepository)?
            } else {
                repo.find_commit(Oid::from_str(&last_hash)?)?
            };
            list_tree(repo, &commit)
        })
        .await
    }

    async fn fetch_file_contents(
        &self,
        files: &[RepositoryFile],
    ) -> Result<HashMap<String, FileContent>> {
        let files = files.to_vec();
        self.with_repo(move |repo, this| {
            let mut contents = HashMap::with_capacity(files.len());
            for file in &files {
                let blob = Oid::from_str(&file.sha)
                    .and_then(|oid| repo.find_blob(oid))
                    .map_err(|_| Error::FileNotFound {
                        path: file.path.clone(),
                    })?;
                let text = std::str::from_utf8(blob.content()).ok().map(str::to_string);
                contents.insert(
                    file.path.clone(),
                    FileContent {
                        text,
                        size: Some(blob.size() as u64),
                        meta: FileMeta::default(),
                    },
                );
            }

            if let Some(tip) = this.tip(repo)? {
                let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
                for (path, meta) in last_touching_commits(repo, &tip, &paths, this.meta_depth)? {
                    if let Some(content) = contents.get_mut(&path) {
                        content.meta = meta;
                    }
                }
            }

            tracing::debug!(count = contents.len(), "fetched blob contents");
            Ok(contents)
        })
        .await
    }

    async fn commit(&self, changes: &[ChangeOp], message: &str) -> Result<CommitResult> {
        let changes = changes.to_vec();
        let message = message.to_string();
        self.with_repo(move |repo, this| {
            let parent = this.tip(repo)?;
            let mut index = Index::new()?;
            if let Some(parent) = &parent {
                index.read_tree(&parent.tree()?)?;
            }

            let mut per_file_hash = HashMap::new();
            for change in &changes {
                apply_change(repo, &mut index, change, &mut per_file_hash)?;
            }

            let tree_id = index.write_tree_to(repo)?;
            let tree = repo.find_tree(tree_id)?;
            let signature = Signature::now(&this.author_name, &this.author_email)?;
            let parents: Vec<&Commit> = parent.iter().collect();
            let oid = repo.commit(
                Some(&this.ref_name()),
                &signature,
                &signature,
                &message,
                &tree,
                &parents,
            )?;

            tracing::info!(commit = %oid, changes = changes.len(), "committed changes");
            Ok(CommitResult {
                hash: oid.to_string(),
                per_file_hash,
            })
        })
        .await
    }
}

fn list_tree(repo: &Repository, commit: &Commit) -> Result<Vec<RepositoryFile>> {
    let tree = commit.tree()?;
    let mut blobs = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(git2::ObjectType::Blob)
            && let Some(name) = entry.name()
        {
            blobs.push((format!("{root}{name}"), entry.id()));
        }
        TreeWalkResult::Ok
    })?;

    let odb = repo.odb()?;
    blobs
        .into_iter()
        .map(|(path, id)| -> Result<RepositoryFile> {
            let (size, _) = odb.read_header(id)?;
            Ok(RepositoryFile::new(path, id.to_string()).with_size(size as u64))
        })
        .collect()
}

fn validate_path(path: &str) -> Result<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|s| s.is_empty() || s == "." || s == "..");
    if invalid {
        return Err(Error::InvalidChange {
            path: path.to_string(),
            reason: "not a normalized repository path".to_string(),
        });
    }
    Ok(())
}

fn stage_blob(index: &mut Index, path: &str, id: Oid, size: usize) -> Result<()> {
    let entry = IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: BLOB_MODE,
        uid: 0,
        gid: 0,
        file_size: size as u32,
        id,
        flags: path.len().min(0xfff) as u16,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    };
    index.add(&entry)?;
    Ok(())
}

fn apply_change(
    repo: &Repository,
    index: &mut Index,
    change: &ChangeOp,
    per_file_hash: &mut HashMap<String, String>,
) -> Result<()> {
    validate_path(&change.path)?;

    match change.action {
        ChangeAction::Create | ChangeAction::Update => {
            let data = change.data.as_deref().ok_or_else(|| Error::InvalidChange {
                path: change.path.clone(),
                reason: format!("{} without data", change.action),
            })?;
            let id = repo.blob(data)?;
            stage_blob(index, &change.path, id, data.len())?;
            per_file_hash.insert(change.path.clone(), id.to_string());
        }
        ChangeAction::Delete => {
            index.remove_path(Path::new(&change.path))?;
        }
        ChangeAction::Move => {
            let previous = change.previous_path.as_deref().ok_or_else(|| Error::InvalidChange {
                path: change.path.clone(),
                reason: "move without previous path".to_string(),
            })?;
            validate_path(previous)?;

            let (id, size) = match change.data.as_deref() {
                Some(data) => (repo.blob(data)?, data.len()),
                None => {
                    let existing = index.get_path(Path::new(previous), 0).ok_or_else(|| {
                        Error::FileNotFound {
                            path: previous.to_string(),
                        }
                    })?;
                    (existing.id, existing.file_size as usize)
                }
            };
            index.remove_path(Path::new(previous))?;
            stage_blob(index, &change.path, id, size)?;
            per_file_hash.insert(change.path.clone(), id.to_string());
        }
    }
    Ok(())
}

fn file_meta(commit: &Commit) -> FileMeta {
    let author = commit.author();
    let date: Option<DateTime<Utc>> = Utc.timestamp_opt(commit.time().seconds(), 0).single();
    FileMeta {
        commit_author: author.name().map(str::to_string),
        commit_email: author.email().map(str::to_string),
        commit_date: date,
    }
}

/// Find the newest commit that changed each path, walking at most `depth`
/// commits back from `tip`.
fn last_touching_commits(
    repo: &Repository,
    tip: &Commit,
    paths: &[&str],
    depth: usize,
) -> Result<HashMap<String, FileMeta>> {
    let mut pending: HashSet<&str> = paths.iter().copied().collect();
    let mut found = HashMap::new();

    let mut revwalk = repo.revwalk()?;
    revwalk.push(tip.id())?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

    for oid in revwalk.take(depth) {
        if pending.is_empty() {
            break;
        }
        let commit = repo.find_commit(oid?)?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parent_count() {
            0 => None,
            _ => Some(commit.parent(0)?.tree()?),
        };

        let touched: Vec<&str> = pending
            .iter()
            .copied()
            .filter(|path| {
                let here = tree.get_path(Path::new(path)).ok().map(|e| e.id());
                let before = parent_tree
                    .as_ref()
                    .and_then(|t| t.get_path(Path::new(path)).ok())
                    .map(|e| e.id());
                here.is_some() && here != before
            })
            .collect();

        for path in touched {
            pending.remove(path);
            found.insert(path.to_string(), file_meta(&commit));
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unnormalized_paths() {
        assert!(validate_path("a/b.md").is_ok());
        assert!(validate_path("../a.md").is_err());
        assert!(validate_path("/a.md").is_err());
        assert!(validate_path("a//b.md").is_err());
        assert!(validate_path("").is_err());
    }
}
