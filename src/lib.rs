#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # Folio
//!
//! A status-driven publishing pipeline for Markdown articles.
//!
//! Articles live in a folder tree where each folder stands for a workflow
//! status (draft, revision, publish, published, rejected, update). Folio
//! watches that tree, moves every article into the folder matching the status
//! in its front matter, asks an editor to approve articles that are ready,
//! and builds and deploys the static site once they are.
//!
//! ## Features
//!
//! - **Status folders**: Danish or English folder names, or your own
//! - **Approval**: web page, ntfy push messages, and email replies
//! - **Publishing**: Hugo builds, git mirror, rsync to the web host
//!
//! ## Quick Start
//!
//! ```bash
//! # Check the configuration
//! folio check-config
//!
//! # Watch, serve approvals, and deploy
//! folio run
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::redundant_clone)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod approval;
pub mod core;
pub mod integrations;
pub mod publish;
pub mod watcher;

pub use approval::{ApprovalCoordinator, DecisionLinks, PendingArticle, PendingStore, ReplyOutcome};
pub use core::{slugify, Article, Config, DeployStage, Error, Result, Status, StatusRouter};
pub use integrations::{ApprovalRequest, CompositeNotifier, InboundReply, Mailbox, MaildirMailbox, Notifier};
pub use publish::{Deployer, GitRsyncDeployer, HugoBuilder, PreviewLocator, SiteBuilder, SiteOutput};
pub use watcher::{ArticleProcessor, ChangeEvent, ChangeKind, FolderWatcher, ProcessOutcome, WatcherSettings};

/// Everything a running pipeline needs, wired from the configuration.
pub struct Pipeline {
    /// The approval coordinator
    pub coordinator: std::sync::Arc<ApprovalCoordinator>,

    /// The document processor
    pub processor: std::sync::Arc<ArticleProcessor>,
}

impl Pipeline {
    /// Wire the real collaborators from the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        use std::sync::Arc;

        let router = StatusRouter::from_config(config)?;
        let store = PendingStore::load(config.pending_file())?;
        let builder: Arc<dyn SiteBuilder> = Arc::new(HugoBuilder::from_config(config)?);
        let deployer: Arc<dyn Deployer> = Arc::new(GitRsyncDeployer::from_config(config));
        let notifier: Arc<dyn Notifier> = Arc::new(CompositeNotifier::from_config(config)?);

        let coordinator = Arc::new(ApprovalCoordinator::new(
            store,
            router.clone(),
            builder,
            deployer,
            notifier,
            DecisionLinks::from_config(config),
        ));
        let processor = Arc::new(ArticleProcessor::new(router, Arc::clone(&coordinator)));

        Ok(Self { coordinator, processor })
    }
}
