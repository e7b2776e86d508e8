//! Error types for the publishing pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Deployment stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    /// Copying the build output into the mirror directory.
    Mirror,
    /// Committing and pushing the mirror repository.
    Commit,
    /// Transferring the mirror to the web host.
    Transfer,
}

impl DeployStage {
    /// Get the display name for this stage.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mirror => "mirror sync",
            Self::Commit => "git commit",
            Self::Transfer => "rsync transfer",
        }
    }
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors that can occur while processing, approving or publishing articles.
#[derive(Debug, Error)]
pub enum Error {
    /// Document is not a front matter + body document.
    #[error("Malformed document {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// A required front matter field is missing.
    #[error("Invalid article {path}: missing required field '{field}'")]
    Validation { path: PathBuf, field: &'static str },

    /// Status name is not one of the known statuses.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// The alias table has no folder for a status.
    #[error("No folder mapping for status '{status}' in language '{language}'")]
    UnmappedStatus { status: String, language: String },

    /// No pending approval exists for an article ID.
    #[error("No pending article with ID {0}")]
    NotFound(String),

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed (exit code {code:?}): {output}")]
    ExternalTool { tool: String, code: Option<i32>, output: String },

    /// A network or mail transport call failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An external call did not finish in time.
    #[error("{operation} timed out after {}s", after.as_secs())]
    Timeout { operation: String, after: Duration },

    /// Full site build failed.
    #[error("Site build failed: {0}")]
    Build(#[source] Box<Error>),

    /// Deployment failed at a given stage.
    #[error("Deploy failed during {stage}: {source}")]
    Deploy {
        stage: DeployStage,
        #[source]
        source: Box<Error>,
    },

    /// An inbound mail message could not be parsed.
    #[error("Mail parse error: {0}")]
    Mail(#[from] mailparse::MailParseError),

    /// The filesystem watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl Error {
    /// Whether this error means the referenced pending article does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Wrap an error as a deploy failure for the given stage.
    pub fn at_stage(self, stage: DeployStage) -> Self {
        Self::Deploy { stage, source: Box::new(self) }
    }
}
