//! End-to-end sync and commit passes over a real git repository
//!
//! Each test seeds a bare repository through [`SiteRepo`], loads the site
//! configuration from disk and keeps the cache in on-disk file stores.

use std::fs;
use std::sync::Arc;

use cms_content::ParsedContent;
use cms_core::{
    AssetEdit, AssetKind, BuildRequest, CommitKind, EntryEdit, SiteConfig, SyncOrchestrator,
};
use cms_fs::FileStoreProvider;
use cms_git::{ChangeOp, Transport};
use cms_test_utils::SiteRepo;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

const SITE_TOML: &str = r#"
media_folder = "static/uploads"

[backend]
repo = "acme/site"

[i18n]
structure = "multiple_folders"
locales = ["en", "fr"]

[[collections]]
name = "posts"
folder = "content/posts"
path = "{{year}}/{{slug}}"

[[collections]]
name = "docs"
folder = "content/docs"
i18n = true
"#;

struct Fixture {
    site: SiteRepo,
    config: Arc<SiteConfig>,
    cache_dir: TempDir,
    _config_dir: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        let config_dir = TempDir::new().unwrap();
        let config_path = config_dir.path().join("site.toml");
        fs::write(&config_path, SITE_TOML).unwrap();
        let config = Arc::new(SiteConfig::load(&config_path).unwrap());

        let site = SiteRepo::new();
        site.commit(
            &[
                (
                    "content/posts/2024/hello.md",
                    "---\ntitle: Hello\nyear: 2024\n---\nHi there\n",
                ),
                ("content/docs/en/intro.md", "---\ntitle: Introduction\n---\n"),
                ("content/docs/fr/intro.md", "---\ntitle: Présentation\n---\n"),
                (".gitattributes", "*.jpg filter=lfs\n"),
                ("package.json", "{}\n"),
            ],
            "Seed site",
        )
        .await;
        site.apply(
            &[ChangeOp::create(
                "static/uploads/cat.jpg",
                vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10],
            )],
            "Add cat",
        )
        .await;

        Self {
            site,
            config,
            cache_dir: TempDir::new().unwrap(),
            _config_dir: config_dir,
        }
    }

    /// A new orchestrator, as a fresh session would create it
    fn orchestrator(&self) -> SyncOrchestrator {
        let transport = self
            .site
            .transport()
            .with_identity(self.config.identity().unwrap());
        let stores = FileStoreProvider::new(self.cache_dir.path());
        SyncOrchestrator::new(self.config.clone(), Arc::new(transport), &stores).unwrap()
    }
}

#[tokio::test]
async fn full_pass_publishes_entries_assets_and_config_files() {
    let fixture = Fixture::new().await;
    let sync = fixture.orchestrator();

    let report = sync.run_sync().await.unwrap();
    assert!(report.listed);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.entries, 2);

    let snapshot = sync.snapshot();
    let hello = snapshot.entry("posts/hello").unwrap();
    assert_eq!(
        hello.locale("_default").unwrap().content.body(),
        Some("Hi there")
    );

    let intro = snapshot.entry("docs/intro").unwrap();
    let locales: Vec<&str> = intro.locales.keys().map(String::as_str).collect();
    assert_eq!(locales, vec!["en", "fr"]);
    assert_eq!(intro.sha, intro.locale("en").unwrap().sha);

    assert_eq!(snapshot.assets.len(), 1);
    assert_eq!(snapshot.assets[0].kind, AssetKind::Image);
    assert_eq!(snapshot.assets[0].size, 6);

    let config: Vec<&str> = snapshot.config_files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(config, vec![".gitattributes"]);

    let cached = sync
        .cache()
        .cached_file("content/posts/2024/hello.md")
        .unwrap()
        .unwrap();
    assert_eq!(cached.meta.commit_author.as_deref(), Some("Test Author"));
    assert!(cached.meta.commit_date.is_some());
}

#[tokio::test]
async fn cache_survives_a_new_session() {
    let fixture = Fixture::new().await;
    fixture.orchestrator().run_sync().await.unwrap();

    let sync = fixture.orchestrator();
    let report = sync.run_sync().await.unwrap();
    assert!(!report.listed);
    assert_eq!(report.fetched, 0);
    assert_eq!(report.entries, 2);
}

#[tokio::test]
async fn outside_edit_refetches_only_that_file() {
    let fixture = Fixture::new().await;
    let sync = fixture.orchestrator();
    sync.run_sync().await.unwrap();

    fixture
        .site
        .commit(
            &[("content/docs/fr/intro.md", "---\ntitle: Introduction (fr)\n---\n")],
            "Translate intro",
        )
        .await;
    let report = sync.run_sync().await.unwrap();

    assert!(report.listed);
    assert_eq!(report.fetched, 1);
    let snapshot = sync.snapshot();
    let fr = snapshot.entry("docs/intro").unwrap().locale("fr").unwrap();
    assert_eq!(fr.content.get_str("title"), Some("Introduction (fr)"));
}

#[tokio::test]
async fn committed_entries_are_reused_by_the_next_sync() {
    let fixture = Fixture::new().await;
    let sync = fixture.orchestrator();
    sync.run_sync().await.unwrap();

    let docs = BuildRequest::new(CommitKind::Create).entry(
        EntryEdit::new("docs")
            .with_slug("setup")
            .with_locale("en", ParsedContent::from_tree(&json!({"title": "Setup"})))
            .with_locale("fr", ParsedContent::from_tree(&json!({"title": "Installation"}))),
    );
    sync.run_commit(&docs).await.unwrap();

    let post = BuildRequest::new(CommitKind::Create).entry(EntryEdit::new("posts").with_locale(
        "_default",
        ParsedContent::from_tree(&json!({"title": "New Post", "year": 2025, "body": "Text"})),
    ));
    sync.run_commit(&post).await.unwrap();

    let transport = fixture.site.transport();
    let mut paths: Vec<String> = transport
        .fetch_file_list("")
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .filter(|p| p.starts_with("content/"))
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "content/docs/en/intro.md",
            "content/docs/en/setup.md",
            "content/docs/fr/intro.md",
            "content/docs/fr/setup.md",
            "content/posts/2024/hello.md",
            "content/posts/2025/new-post.md",
        ]
    );

    let report = sync.run_sync().await.unwrap();
    assert!(report.listed);
    assert_eq!(report.fetched, 0);
    let snapshot = sync.snapshot();
    assert_eq!(snapshot.entry("docs/setup").unwrap().locales.len(), 2);
    assert!(snapshot.entry("posts/new-post").is_some());
}

#[tokio::test]
async fn uploaded_media_appears_as_asset() {
    let fixture = Fixture::new().await;
    let sync = fixture.orchestrator();
    sync.run_sync().await.unwrap();

    let upload = BuildRequest::new(CommitKind::UploadMedia)
        .asset(AssetEdit::upload("static/uploads/dog.png", vec![0x89, 0x50, 0x4e, 0x47]));
    sync.run_commit(&upload).await.unwrap();

    let head = fixture.site.transport().fetch_last_commit().await.unwrap();
    assert_eq!(head.message, "Upload “static/uploads/dog.png”");

    sync.run_sync().await.unwrap();
    let snapshot = sync.snapshot();
    let paths: Vec<&str> = snapshot.assets.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(paths, vec!["static/uploads/cat.jpg", "static/uploads/dog.png"]);
}
