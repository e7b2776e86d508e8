//! Human approval of articles.
//!
//! The [`ApprovalCoordinator`] owns the pending set. It asks for a decision
//! when an article enters `publish` or `update`, and finalizes decisions that
//! arrive over HTTP or as email replies.

mod page;
pub mod reply;
pub mod server;
mod store;

pub use reply::{detect_action, resolve_article_id, ReplyAction};
pub use server::{configure_routes, ServerState};
pub use store::{PendingArticle, PendingMap, PendingStore};

use std::sync::Arc;

use crate::core::{Article, Config, Error, Result, Status, StatusRouter};
use crate::integrations::{ApprovalRequest, InboundReply, Notifier};
use crate::publish::{Deployer, PreviewLocator, SiteBuilder};

/// Result of handling an email reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// The article was approved
    Approved(Article),
    /// The article was rejected
    Rejected(Article),
    /// The reply did not contain a decision
    Ignored,
}

/// Builds the links sent to the editor.
#[derive(Debug, Clone, Default)]
pub struct DecisionLinks {
    /// Base URL of the approval server, without trailing slash
    pub public_url: String,

    /// Shared token appended to decision links
    pub token: Option<String>,
}

impl DecisionLinks {
    /// Create links from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self { public_url: config.public_url(), token: config.approval.token.clone() }
    }

    /// Link to the decision page for an article.
    pub fn decision_url(&self, id: &str) -> String {
        let mut url = format!("{}/approve/{}", self.public_url, urlencoding::encode(id));
        if let Some(ref token) = self.token {
            url.push_str("?token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    /// Link to a built preview.
    pub fn preview_url(&self, preview: &PreviewLocator) -> String {
        format!("{}{}", self.public_url, preview.url_path)
    }
}

/// Coordinates approval requests and decisions.
pub struct ApprovalCoordinator {
    store: PendingStore,
    router: StatusRouter,
    builder: Arc<dyn SiteBuilder>,
    deployer: Arc<dyn Deployer>,
    notifier: Arc<dyn Notifier>,
    links: DecisionLinks,
    request_gate: tokio::sync::Mutex<()>,
}

impl ApprovalCoordinator {
    /// Create a coordinator.
    pub fn new(
        store: PendingStore,
        router: StatusRouter,
        builder: Arc<dyn SiteBuilder>,
        deployer: Arc<dyn Deployer>,
        notifier: Arc<dyn Notifier>,
        links: DecisionLinks,
    ) -> Self {
        Self { store, router, builder, deployer, notifier, links, request_gate: tokio::sync::Mutex::new(()) }
    }

    /// The status router used for relocation.
    pub fn router(&self) -> &StatusRouter {
        &self.router
    }

    /// The links handed out in notifications.
    pub fn links(&self) -> &DecisionLinks {
        &self.links
    }

    /// All pending articles, oldest first.
    pub fn pending(&self) -> Vec<PendingArticle> {
        self.store.list()
    }

    /// Look up a pending article.
    pub fn get(&self, id: &str) -> Option<PendingArticle> {
        self.store.get(id)
    }

    /// Ask the editor to approve an article.
    ///
    /// Returns `false` without doing anything when a notification for this
    /// article already went out. Nothing is recorded if notifying fails.
    pub async fn request_approval(&self, article: &Article) -> Result<bool> {
        let _gate = self.request_gate.lock().await;

        if self.store.notification_sent(article.id()) {
            tracing::debug!(id = %article.id(), "Approval already requested");
            return Ok(false);
        }

        let preview = self.builder.build_preview(article).await?;
        let request = ApprovalRequest {
            id: article.id().to_string(),
            title: article.title().to_string(),
            author: article.author().to_string(),
            preview_url: self.links.preview_url(&preview),
            decision_url: self.links.decision_url(article.id()),
        };

        self.notifier.notify_approval(&request).await?;
        self.store.upsert(PendingArticle::new(article.clone(), Some(preview)))?;

        tracing::info!(id = %article.id(), title = %article.title(), "Approval requested");
        Ok(true)
    }

    /// Approve an article: mark it published and move it.
    pub async fn approve(&self, id: &str) -> Result<Article> {
        self.finalize(id, Status::Published).await
    }

    /// Approve an article, then build and deploy the site.
    ///
    /// A build or deploy failure does not undo the approval.
    pub async fn approve_and_deploy(&self, id: &str) -> Result<Article> {
        let article = self.finalize(id, Status::Published).await?;
        self.build_and_deploy().await?;
        Ok(article)
    }

    /// Reject an article and move it.
    pub async fn reject(&self, id: &str) -> Result<Article> {
        self.finalize(id, Status::Rejected).await
    }

    /// Apply the decision contained in an email reply.
    pub async fn handle_reply(&self, reply: &InboundReply) -> Result<ReplyOutcome> {
        let id = resolve_article_id(reply).ok_or_else(|| Error::NotFound(format!("(no article ID in '{}')", reply.subject)))?;
        if self.store.get(&id).is_none() {
            return Err(Error::NotFound(id));
        }

        match detect_action(&reply.subject, &reply.body) {
            ReplyAction::Approve => Ok(ReplyOutcome::Approved(self.approve(&id).await?)),
            ReplyAction::Reject => Ok(ReplyOutcome::Rejected(self.reject(&id).await?)),
            ReplyAction::Unknown => {
                tracing::warn!(id = %id, subject = %reply.subject, "Reply contains no decision");
                Ok(ReplyOutcome::Ignored)
            }
        }
    }

    /// Build the full site from the published articles and deploy it.
    pub async fn build_and_deploy(&self) -> Result<()> {
        let published = self.published_articles()?;
        let site = self.builder.build_full_site(&published).await.map_err(|e| Error::Build(Box::new(e)))?;
        self.deployer.deploy(&site).await
    }

    /// Every parseable article in the published folder.
    pub fn published_articles(&self) -> Result<Vec<Article>> {
        let folder = self.router.folder_for(Status::Published)?;
        if !folder.exists() {
            return Ok(Vec::new());
        }

        let mut articles = Vec::new();
        for entry in walkdir::WalkDir::new(&folder).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
            if !crate::core::is_article_path(entry.path()) {
                continue;
            }
            match Article::parse(entry.path()) {
                Ok(article) => articles.push(article),
                Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "Skipping unparseable article"),
            }
        }
        Ok(articles)
    }

    async fn finalize(&self, id: &str, status: Status) -> Result<Article> {
        let pending = self.store.take(id)?;
        let mut article = self.reload(&pending);

        article.set_status(status);
        article.persist()?;
        self.router.relocate(&mut article)?;

        if let Err(e) = self.builder.remove_preview(&article).await {
            tracing::warn!(id, error = %e, "Failed to remove preview");
        }
        if let Err(e) = self.notifier.clear(id).await {
            tracing::warn!(id, error = %e, "Failed to clear notifications");
        }

        tracing::info!(id, title = %article.title(), status = %status, path = %article.file_path.display(), "Decision applied");
        Ok(article)
    }

    /// Current version of a pending article: from its last known path,
    /// then by searching the watched folders, then the stored snapshot.
    fn reload(&self, pending: &PendingArticle) -> Article {
        match Article::parse(&pending.article.file_path) {
            Ok(article) if article.id() == pending.id => return article,
            Ok(_) => {}
            Err(e) => tracing::debug!(id = %pending.id, error = %e, "Pending article moved"),
        }

        if let Some(article) = self.router.find_by_id(&pending.id) {
            return article;
        }

        tracing::warn!(id = %pending.id, path = %pending.article.file_path.display(), "Article file not found; using snapshot");
        pending.article.clone()
    }
}
