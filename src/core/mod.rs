//! Core types for Folio.
//!
//! This module contains the fundamental data structures used throughout
//! the application: articles, status routing, configuration, and errors.

mod article;
mod config;
mod error;
mod mover;

pub use article::{slugify, Article, FrontMatter, Status, WorkflowState};
pub use config::{
    builtin_aliases, ApprovalConfig, Config, DeployConfig, EmailConfig, FolderAliases, GitConfig,
    HugoConfig, NtfyConfig, RsyncConfig, StorageConfig, TimeoutConfig, WatcherConfig,
};
pub use error::{DeployStage, Error, Result};
pub use mover::{is_article_path, StatusRouter};
