//! Site building and deployment.
//!
//! The static site generator and the deployment transport are external
//! tools. This module puts them behind two narrow traits so the approval
//! flow can be driven by fakes in tests.

mod deployer;
mod hugo;
mod process;

pub use deployer::GitRsyncDeployer;
pub use hugo::HugoBuilder;
pub use process::{copy_tree, ExecutionResult, ProcessRunner};

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Article, Result};

/// Where a built preview can be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewLocator {
    /// Entry page of the preview on disk
    pub index: PathBuf,

    /// Path of the preview under the approval server's `/preview` mount
    pub url_path: String,
}

/// Output of a full site build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteOutput {
    /// Directory the generator wrote to
    pub output_dir: PathBuf,

    /// Directory that gets committed and transferred
    pub mirror_dir: PathBuf,
}

/// Static site generator.
#[async_trait]
pub trait SiteBuilder: Send + Sync {
    /// Build a preview of a single article.
    async fn build_preview(&self, article: &Article) -> Result<PreviewLocator>;

    /// Build the whole site from the published articles.
    async fn build_full_site(&self, published: &[Article]) -> Result<SiteOutput>;

    /// Remove preview artifacts for an article.
    async fn remove_preview(&self, article: &Article) -> Result<()>;
}

/// Deployment transport.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploy a built site. Failures carry the stage that failed.
    async fn deploy(&self, site: &SiteOutput) -> Result<()>;
}
