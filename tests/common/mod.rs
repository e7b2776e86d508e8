//! Shared fixtures and collaborator fakes for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use folio::core::builtin_aliases;
use folio::{
    ApprovalCoordinator, ApprovalRequest, Article, ArticleProcessor, DecisionLinks, DeployStage, Deployer, Error,
    Notifier, PendingStore, PreviewLocator, Result, SiteBuilder, SiteOutput, Status, StatusRouter,
};

/// Builder that writes a stub preview instead of running hugo.
#[derive(Default)]
pub struct FakeBuilder {
    pub preview_root: PathBuf,
    pub previews: AtomicUsize,
    pub full_builds: Mutex<Vec<Vec<String>>>,
    pub fail_full_build: AtomicBool,
}

impl FakeBuilder {
    pub fn new(preview_root: &Path) -> Self {
        Self { preview_root: preview_root.to_path_buf(), ..Default::default() }
    }

    pub fn preview_index(&self, slug: &str) -> PathBuf {
        self.preview_root.join(slug).join("index.html")
    }
}

#[async_trait]
impl SiteBuilder for FakeBuilder {
    async fn build_preview(&self, article: &Article) -> Result<PreviewLocator> {
        self.previews.fetch_add(1, Ordering::SeqCst);
        let index = self.preview_index(&article.slug());
        std::fs::create_dir_all(index.parent().unwrap())?;
        std::fs::write(&index, format!("<h1>{}</h1>", article.title()))?;
        Ok(PreviewLocator { index, url_path: format!("/preview/{}/index.html", article.slug()) })
    }

    async fn build_full_site(&self, published: &[Article]) -> Result<SiteOutput> {
        if self.fail_full_build.load(Ordering::SeqCst) {
            return Err(Error::ExternalTool { tool: "hugo".into(), code: Some(255), output: "template error".into() });
        }
        self.full_builds.lock().push(published.iter().map(|a| a.id().to_string()).collect());
        Ok(SiteOutput { output_dir: self.preview_root.join("public"), mirror_dir: self.preview_root.join("mirror") })
    }

    async fn remove_preview(&self, article: &Article) -> Result<()> {
        let dir = self.preview_root.join(article.slug());
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Notifier that records requests.
#[derive(Default)]
pub struct FakeNotifier {
    pub requests: Mutex<Vec<ApprovalRequest>>,
    pub cleared: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl FakeNotifier {
    pub fn sent(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    fn name(&self) -> &str {
        "fake"
    }

    async fn notify_approval(&self, request: &ApprovalRequest) -> Result<()> {
        // Yield so concurrent requests interleave.
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Transport("ntfy returned status 502".into()));
        }
        self.requests.lock().push(request.clone());
        Ok(())
    }

    async fn clear(&self, id: &str) -> Result<()> {
        self.cleared.lock().push(id.to_string());
        Ok(())
    }
}

/// Deployer that records deployments.
#[derive(Default)]
pub struct FakeDeployer {
    pub deployed: AtomicUsize,
    pub fail_stage: Mutex<Option<DeployStage>>,
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn deploy(&self, _site: &SiteOutput) -> Result<()> {
        if let Some(stage) = *self.fail_stage.lock() {
            return Err(Error::ExternalTool { tool: "rsync".into(), code: Some(12), output: "connection closed".into() }
                .at_stage(stage));
        }
        self.deployed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A temporary article tree wired to fakes.
pub struct Harness {
    pub dir: TempDir,
    pub router: StatusRouter,
    pub builder: Arc<FakeBuilder>,
    pub notifier: Arc<FakeNotifier>,
    pub deployer: Arc<FakeDeployer>,
    pub coordinator: Arc<ApprovalCoordinator>,
    pub processor: Arc<ArticleProcessor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_links(DecisionLinks { public_url: "http://localhost:8080".into(), token: None })
    }

    pub fn with_links(links: DecisionLinks) -> Self {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("articles");
        let router = StatusRouter::new(&base, "da", builtin_aliases().remove("da").unwrap());
        router.ensure_folders().unwrap();

        let builder = Arc::new(FakeBuilder::new(&base.join("godkendelse")));
        let notifier = Arc::new(FakeNotifier::default());
        let deployer = Arc::new(FakeDeployer::default());
        let store = PendingStore::load(base.join(".pending_approvals.json")).unwrap();

        let coordinator = Arc::new(ApprovalCoordinator::new(
            store,
            router.clone(),
            builder.clone(),
            deployer.clone(),
            notifier.clone(),
            links,
        ));
        let processor = Arc::new(ArticleProcessor::new(router.clone(), Arc::clone(&coordinator)));

        Self { dir, router, builder, notifier, deployer, coordinator, processor }
    }

    pub fn base(&self) -> PathBuf {
        self.dir.path().join("articles")
    }

    pub fn folder(&self, status: Status) -> PathBuf {
        self.router.folder_for(status).unwrap()
    }

    pub fn pending_file(&self) -> PathBuf {
        self.base().join(".pending_approvals.json")
    }

    /// Write an article with the given flags set into a status folder.
    pub fn write_article(&self, folder: Status, file: &str, id: &str, title: &str, flags: &[&str]) -> PathBuf {
        let path = self.folder(folder).join(file);
        std::fs::write(&path, article_text(id, title, flags)).unwrap();
        path
    }
}

/// Document text for an article with the given flags set.
pub fn article_text(id: &str, title: &str, flags: &[&str]) -> String {
    let mut status = String::new();
    for name in ["draft", "revision", "publish", "published", "rejected", "update"] {
        let value = u8::from(flags.contains(&name));
        status.push_str(&format!("  {name}: {value}\n"));
    }
    format!("---\nid: '{id}'\ntitle: {title}\nauthor: Jane Doe\nstatus:\n{status}---\n\nBody of {title}.\n")
}
