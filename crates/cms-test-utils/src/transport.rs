//! In-memory transport with call counters and failure injection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use cms_fs::compute_content_checksum;
use cms_git::{
    ChangeAction, ChangeOp, CommitResult, Error, FileContent, FileMeta, LastCommit,
    RepositoryFile, RepositoryIdentity, Result, Transport,
};
use parking_lot::Mutex;

/// Number of calls made to each transport operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub last_commit: usize,
    pub file_list: usize,
    pub contents: usize,
    /// Files requested across all content calls
    pub content_files: usize,
    pub commit: usize,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    head: Option<LastCommit>,
    commits: usize,
}

impl State {
    fn advance(&mut self, message: &str) -> String {
        self.commits += 1;
        let hash = compute_content_checksum(format!("commit-{}", self.commits));
        self.head = Some(LastCommit {
            hash: hash.clone(),
            message: message.to_string(),
        });
        hash
    }
}

/// A repository held in memory.
///
/// File `sha`s are [`compute_content_checksum`] of the bytes, so identical
/// content always lists with the same hash.
#[derive(Debug)]
pub struct MockTransport {
    identity: RepositoryIdentity,
    state: Mutex<State>,
    last_commit_calls: AtomicUsize,
    file_list_calls: AtomicUsize,
    content_calls: AtomicUsize,
    content_files: AtomicUsize,
    commit_calls: AtomicUsize,
    fail_last_commit: AtomicBool,
    fail_file_list: AtomicBool,
    content_failures: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Empty repository with identity `mock:owner/site`
    pub fn new() -> Self {
        Self {
            identity: RepositoryIdentity::new("mock", "owner", "site"),
            state: Mutex::new(State::default()),
            last_commit_calls: AtomicUsize::new(0),
            file_list_calls: AtomicUsize::new(0),
            content_calls: AtomicUsize::new(0),
            content_files: AtomicUsize::new(0),
            commit_calls: AtomicUsize::new(0),
            fail_last_commit: AtomicBool::new(false),
            fail_file_list: AtomicBool::new(false),
            content_failures: AtomicUsize::new(0),
        }
    }

    /// Repository with one commit holding `files`
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let transport = Self::new();
        transport.push(files, "Initial commit");
        transport
    }

    pub fn with_identity(mut self, identity: RepositoryIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Write text files as a new commit, as an outside writer. Returns the new head.
    pub fn push<'a>(
        &self,
        files: impl IntoIterator<Item = (&'a str, &'a str)>,
        message: &str,
    ) -> String {
        let mut state = self.state.lock();
        for (path, text) in files {
            state.files.insert(path.to_string(), text.as_bytes().to_vec());
        }
        state.advance(message)
    }

    /// Write raw bytes as a new commit
    pub fn push_bytes(&self, path: &str, data: Vec<u8>, message: &str) -> String {
        let mut state = self.state.lock();
        state.files.insert(path.to_string(), data);
        state.advance(message)
    }

    /// Delete files as a new commit
    pub fn remove(&self, paths: &[&str], message: &str) -> String {
        let mut state = self.state.lock();
        for path in paths {
            state.files.remove(*path);
        }
        state.advance(message)
    }

    /// Current bytes of a file
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn file_text(&self, path: &str) -> Option<String> {
        self.file(path).and_then(|data| String::from_utf8(data).ok())
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    pub fn head(&self) -> Option<LastCommit> {
        self.state.lock().head.clone()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            last_commit: self.last_commit_calls.load(Ordering::SeqCst),
            file_list: self.file_list_calls.load(Ordering::SeqCst),
            contents: self.content_calls.load(Ordering::SeqCst),
            content_files: self.content_files.load(Ordering::SeqCst),
            commit: self.commit_calls.load(Ordering::SeqCst),
        }
    }

    pub fn reset_calls(&self) {
        for counter in [
            &self.last_commit_calls,
            &self.file_list_calls,
            &self.content_calls,
            &self.content_files,
            &self.commit_calls,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    pub fn fail_last_commit(&self, fail: bool) {
        self.fail_last_commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_file_list(&self, fail: bool) {
        self.fail_file_list.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` content requests
    pub fn fail_next_content_fetches(&self, count: usize) {
        self.content_failures.store(count, Ordering::SeqCst);
    }

    fn take_content_failure(&self) -> bool {
        self.content_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn mock_meta() -> FileMeta {
    FileMeta {
        commit_author: Some("Mock Author".to_string()),
        commit_email: Some("mock@example.com".to_string()),
        commit_date: None,
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn identity(&self) -> &RepositoryIdentity {
        &self.identity
    }

    async fn fetch_last_commit(&self) -> Result<LastCommit> {
        self.last_commit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_last_commit.load(Ordering::SeqCst) {
            return Err(Error::remote("last commit", "injected failure"));
        }
        self.state.lock().head.clone().ok_or(Error::EmptyRepository)
    }

    async fn fetch_file_list(&self, _last_hash: &str) -> Result<Vec<RepositoryFile>> {
        self.file_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_file_list.load(Ordering::SeqCst) {
            return Err(Error::remote("file list", "injected failure"));
        }
        let state = self.state.lock();
        Ok(state
            .files
            .iter()
            .map(|(path, data)| {
                RepositoryFile::new(path, compute_content_checksum(data))
                    .with_size(data.len() as u64)
            })
            .collect())
    }

    async fn fetch_file_contents(
        &self,
        files: &[RepositoryFile],
    ) -> Result<HashMap<String, FileContent>> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.content_files.fetch_add(files.len(), Ordering::SeqCst);
        if self.take_content_failure() {
            return Err(Error::remote("file contents", "injected failure"));
        }
        let state = self.state.lock();
        Ok(files
            .iter()
            .filter_map(|file| {
                let data = state.files.get(&file.path)?;
                Some((
                    file.path.clone(),
                    FileContent {
                        text: String::from_utf8(data.clone()).ok(),
                        size: Some(data.len() as u64),
                        meta: mock_meta(),
                    },
                ))
            })
            .collect())
    }

    async fn commit(&self, changes: &[ChangeOp], message: &str) -> Result<CommitResult> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();

        let mut files = state.files.clone();
        let mut per_file_hash = HashMap::new();
        for change in changes {
            match change.action {
                ChangeAction::Create | ChangeAction::Update => {
                    let data = change.data.clone().ok_or_else(|| Error::InvalidChange {
                        path: change.path.clone(),
                        reason: format!("{} without data", change.action),
                    })?;
                    per_file_hash.insert(change.path.clone(), compute_content_checksum(&data));
                    files.insert(change.path.clone(), data);
                }
                ChangeAction::Delete => {
                    files.remove(&change.path);
                }
                ChangeAction::Move => {
                    let previous = change.previous_path.as_deref().ok_or_else(|| {
                        Error::InvalidChange {
                            path: change.path.clone(),
                            reason: "move without previous path".to_string(),
                        }
                    })?;
                    let old = files.remove(previous).ok_or_else(|| Error::FileNotFound {
                        path: previous.to_string(),
                    })?;
                    let data = change.data.clone().unwrap_or(old);
                    per_file_hash.insert(change.path.clone(), compute_content_checksum(&data));
                    files.insert(change.path.clone(), data);
                }
            }
        }

        state.files = files;
        let hash = state.advance(message);
        Ok(CommitResult {
            hash,
            per_file_hash,
        })
    }
}
