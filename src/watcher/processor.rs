//! Handling of a single article document.
//!
//! Shared by change notifications and periodic rescans.

use std::path::Path;
use std::sync::Arc;

use crate::approval::ApprovalCoordinator;
use crate::core::{Article, Result, Status, StatusRouter};

/// What processing did with a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The document has no status and was left alone
    Skipped,
    /// The document is in the folder for its status
    Placed(Status),
    /// Approval was requested; `false` if it had been requested before
    ApprovalRequested { sent: bool },
    /// A rejected article was resubmitted for approval
    Resubmitted { sent: bool },
}

/// Totals of a full scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Documents processed without error
    pub processed: usize,
    /// Documents without a status
    pub skipped: usize,
    /// Documents that failed to process
    pub failed: usize,
}

/// Places articles by status and triggers approval.
pub struct ArticleProcessor {
    router: StatusRouter,
    coordinator: Arc<ApprovalCoordinator>,
}

impl ArticleProcessor {
    /// Create a processor.
    pub fn new(router: StatusRouter, coordinator: Arc<ApprovalCoordinator>) -> Self {
        Self { router, coordinator }
    }

    /// The status router.
    pub fn router(&self) -> &StatusRouter {
        &self.router
    }

    /// Process one document.
    pub async fn process(&self, path: &Path) -> Result<ProcessOutcome> {
        let mut article = Article::parse(path)?;

        let Some(status) = article.current_status() else {
            tracing::debug!(path = %path.display(), "No status set, skipping");
            return Ok(ProcessOutcome::Skipped);
        };

        if status == Status::Rejected && article.resubmission_requested() {
            tracing::info!(id = %article.id(), title = %article.title(), "Rejected article resubmitted");
            article.set_status(Status::Publish);
            article.persist()?;
            self.router.relocate(&mut article)?;
            let sent = self.coordinator.request_approval(&article).await?;
            return Ok(ProcessOutcome::Resubmitted { sent });
        }

        self.router.relocate(&mut article)?;

        if status.needs_approval() {
            let sent = self.coordinator.request_approval(&article).await?;
            Ok(ProcessOutcome::ApprovalRequested { sent })
        } else {
            Ok(ProcessOutcome::Placed(status))
        }
    }

    /// Process every document in every monitored folder.
    ///
    /// Failures are logged and counted; they do not stop the scan.
    pub async fn scan_all(&self) -> ScanSummary {
        let mut summary = ScanSummary::default();
        for path in self.router.markdown_files() {
            match self.process(&path).await {
                Ok(ProcessOutcome::Skipped) => summary.skipped += 1,
                Ok(_) => summary.processed += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(path = %path.display(), error = %e, "Failed to process article");
                }
            }
        }
        tracing::debug!(?summary, "Scan finished");
        summary
    }
}
