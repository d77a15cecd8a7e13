//! Local git transport against throwaway repositories

use cms_git::{ChangeOp, Error, LocalGitTransport, RepositoryIdentity, Transport};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

fn empty_repo() -> (TempDir, LocalGitTransport) {
    let dir = TempDir::new().unwrap();
    git2::Repository::init_bare(dir.path()).unwrap();
    let transport = LocalGitTransport::open(dir.path())
        .unwrap()
        .with_author("Ann Author", "ann@example.com");
    (dir, transport)
}

async fn seeded_repo() -> (TempDir, LocalGitTransport) {
    let (dir, transport) = empty_repo();
    transport
        .commit(
            &[
                ChangeOp::create("content/posts/a.md", "---\ntitle: A\n---\nBody A\n"),
                ChangeOp::create("content/posts/b.md", "---\ntitle: B\n---\nBody B\n"),
                ChangeOp::create("static/logo.png", vec![0x89, 0x50, 0x4e, 0x47, 0xff, 0x00]),
                ChangeOp::create(".gitignore", "node_modules\n"),
            ],
            "Initial content",
        )
        .await
        .unwrap();
    (dir, transport)
}

#[tokio::test]
async fn empty_repository_has_no_last_commit() {
    let (_dir, transport) = empty_repo();
    assert!(matches!(
        transport.fetch_last_commit().await,
        Err(Error::EmptyRepository)
    ));
}

#[tokio::test]
async fn commit_then_read_head() {
    let (_dir, transport) = empty_repo();
    let result = transport
        .commit(&[ChangeOp::create("a.json", "{}\n")], "[skip ci] First")
        .await
        .unwrap();

    let last = transport.fetch_last_commit().await.unwrap();
    assert_eq!(last.hash, result.hash);
    assert_eq!(last.message, "[skip ci] First");
    assert!(result.per_file_hash.contains_key("a.json"));
}

#[tokio::test]
async fn file_list_uses_blob_ids() {
    let (_dir, transport) = seeded_repo().await;
    let head = transport.fetch_last_commit().await.unwrap();

    let mut files = transport.fetch_file_list(&head.hash).await.unwrap();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![".gitignore", "content/posts/a.md", "content/posts/b.md", "static/logo.png"]
    );

    let logo = files.iter().find(|f| f.name == "logo.png").unwrap();
    assert_eq!(logo.size, Some(6));
    assert_eq!(logo.sha.len(), 40);
}

#[tokio::test]
async fn contents_carry_text_and_commit_meta() {
    let (_dir, transport) = seeded_repo().await;
    let files = transport.fetch_file_list("").await.unwrap();

    let contents = transport.fetch_file_contents(&files).await.unwrap();
    assert_eq!(contents.len(), 4);

    let post = &contents["content/posts/a.md"];
    assert_eq!(post.text.as_deref(), Some("---\ntitle: A\n---\nBody A\n"));
    assert_eq!(post.meta.commit_author.as_deref(), Some("Ann Author"));
    assert_eq!(post.meta.commit_email.as_deref(), Some("ann@example.com"));
    assert!(post.meta.commit_date.is_some());

    let logo = &contents["static/logo.png"];
    assert_eq!(logo.text, None);
    assert_eq!(logo.size, Some(6));
}

#[tokio::test]
async fn update_delete_and_move_in_one_commit() {
    let (_dir, transport) = seeded_repo().await;
    let result = transport
        .commit(
            &[
                ChangeOp::update("content/posts/a.md", "---\ntitle: A2\n---\n"),
                ChangeOp::delete("static/logo.png"),
                ChangeOp::moved("content/posts/b.md", "content/posts/c.md", None),
            ],
            "Edit",
        )
        .await
        .unwrap();

    let files = transport.fetch_file_list(&result.hash).await.unwrap();
    let mut paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![".gitignore", "content/posts/a.md", "content/posts/c.md"]
    );

    for file in &files {
        if let Some(hash) = result.per_file_hash.get(&file.path) {
            assert_eq!(hash, &file.sha);
        }
    }
    assert_eq!(result.per_file_hash.len(), 2);
}

#[rstest]
#[case::parent("../escape.md")]
#[case::absolute("/etc/passwd")]
#[case::backslash("content\\a.md")]
#[case::empty_segment("content//a.md")]
#[tokio::test]
async fn invalid_change_leaves_head_untouched(#[case] path: &str) {
    let (_dir, transport) = seeded_repo().await;
    let before = transport.fetch_last_commit().await.unwrap();

    let err = transport
        .commit(
            &[ChangeOp::create("ok.md", "x"), ChangeOp::create(path, "x")],
            "Bad",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidChange { .. }));

    let after = transport.fetch_last_commit().await.unwrap();
    assert_eq!(before, after);
}

#[test]
fn identity_namespace() {
    let identity = RepositoryIdentity::new("github", "owner", "site");
    assert_eq!(identity.namespace(), "github:owner/site");
    assert_eq!(identity.to_string(), "github:owner/site");
}

#[tokio::test]
async fn identity_can_be_overridden() {
    let (dir, transport) = empty_repo();
    let transport = transport.with_identity(RepositoryIdentity::new("local", "me", "blog"));
    assert_eq!(transport.identity().namespace(), "local:me/blog");
    assert_eq!(transport.path(), dir.path());
}
