//! Configuration management for Folio.
//!
//! Handles loading configuration from TOML files, applying environment
//! overrides and validating the result before anything starts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::article::Status;
use super::error::{Error, Result};

/// File name of the local configuration file.
pub const LOCAL_CONFIG_FILE: &str = "folio.toml";

/// Per-language mapping from status name to folder name.
pub type FolderAliases = HashMap<String, HashMap<String, String>>;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Article storage settings
    pub storage: StorageConfig,

    /// Folder watcher settings
    pub watcher: WatcherConfig,

    /// Approval web server settings
    pub approval: ApprovalConfig,

    /// Push notifications via ntfy
    pub ntfy: NtfyConfig,

    /// Email notifications and replies
    pub email: EmailConfig,

    /// Hugo site settings
    pub hugo: HugoConfig,

    /// Git mirror settings
    pub git: GitConfig,

    /// Rsync transfer settings
    pub rsync: RsyncConfig,

    /// Periodic deploy settings
    pub deploy: DeployConfig,

    /// Timeouts for external calls
    pub timeouts: TimeoutConfig,

    /// Folder alias overrides, merged over the built-in tables
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub aliases: FolderAliases,
}

/// Article storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the workflow folder tree
    pub base_path: PathBuf,

    /// Which alias table to use for folder names (e.g. "da", "en")
    pub language: String,

    /// Optional YAML file with additional folder aliases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases_file: Option<PathBuf>,

    /// Folder (under base_path) holding approval previews
    pub preview_folder: String,
}

/// Folder watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period before a changed file is processed
    pub debounce_ms: u64,

    /// Interval between full folder rescans
    pub rescan_secs: u64,
}

/// Approval web server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Externally reachable base URL used in decision links
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Shared token required by decision pages and actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// ntfy push notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NtfyConfig {
    /// Whether push notifications are sent
    pub enabled: bool,

    /// ntfy server URL
    pub server: String,

    /// Topic to publish to
    pub topic: String,

    /// Message priority (1-5)
    pub priority: u8,
}

/// Email settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Whether approval emails are sent
    pub enabled: bool,

    /// Sender address
    pub from: String,

    /// Approval recipient
    pub to: String,

    /// Sendmail-compatible command reading a message on stdin
    pub sendmail: Vec<String>,

    /// Maildir receiving replies; reply polling is off when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maildir: Option<PathBuf>,

    /// Interval between mailbox polls
    pub poll_secs: u64,
}

/// Hugo site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HugoConfig {
    /// Hugo executable
    pub binary: String,

    /// Hugo site source directory
    pub site_dir: PathBuf,

    /// Build output directory
    pub public_dir: PathBuf,

    /// Mirror directory that gets committed and deployed
    pub mirror_dir: PathBuf,
}

/// Git mirror settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Commit and push the mirror after each build
    pub auto_commit: bool,

    /// Remote for the mirror repository
    pub mirror_repo: String,

    /// Branch to push
    pub branch: String,
}

/// Rsync transfer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RsyncConfig {
    /// Whether the mirror is transferred to a web host
    pub enabled: bool,

    /// Remote host
    pub host: String,

    /// Remote user
    pub user: String,

    /// Remote target directory
    pub target_path: String,

    /// SSH key used for the transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<PathBuf>,
}

/// Periodic deploy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Minutes between periodic build+deploy runs (0 disables)
    pub interval_mins: u64,
}

/// Timeouts for external processes and network calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Hugo builds
    pub build_secs: u64,

    /// git and rsync invocations
    pub deploy_secs: u64,

    /// HTTP and mail transport calls
    pub network_secs: u64,
}

impl TimeoutConfig {
    /// Build timeout.
    pub fn build(&self) -> Duration {
        Duration::from_secs(self.build_secs)
    }

    /// Deploy timeout.
    pub fn deploy(&self) -> Duration {
        Duration::from_secs(self.deploy_secs)
    }

    /// Network timeout.
    pub fn network(&self) -> Duration {
        Duration::from_secs(self.network_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::new(),
            language: "da".to_string(),
            aliases_file: None,
            preview_folder: "godkendelse".to_string(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { debounce_ms: 500, rescan_secs: 120 }
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080, public_url: None, token: None }
    }
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self { enabled: false, server: "https://ntfy.sh".to_string(), topic: String::new(), priority: 4 }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            from: String::new(),
            to: String::new(),
            sendmail: vec!["/usr/sbin/sendmail".to_string(), "-t".to_string(), "-i".to_string()],
            maildir: None,
            poll_secs: 60,
        }
    }
}

impl Default for HugoConfig {
    fn default() -> Self {
        Self {
            binary: "hugo".to_string(),
            site_dir: PathBuf::new(),
            public_dir: PathBuf::from("public"),
            mirror_dir: PathBuf::from("mirror"),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { auto_commit: false, mirror_repo: String::new(), branch: "main".to_string() }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self { interval_mins: 10 }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { build_secs: 300, deploy_secs: 600, network_secs: 30 }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Uses `path` when given, otherwise looks for:
    /// 1. `folio.toml` in the current directory
    /// 2. `~/.config/folio/config.toml`
    ///
    /// A `.env` file is loaded first so secrets can come from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(Error::Config(format!("failed to load .env: {e}")));
            }
        }

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::find_config_file()
                .ok_or_else(|| Error::Config("no configuration file found".to_string()))?,
        };

        let mut config = Self::load_from_file(&path)?;
        config.apply_env_overrides();
        config.expand_paths();
        config.load_aliases_file()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a specific file without env overrides.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        let global = Self::config_dir()?.join("config.toml");
        global.exists().then_some(global)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("folio"))
    }

    /// Override secrets from environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(topic) = std::env::var("FOLIO_NTFY_TOPIC") {
            if !topic.is_empty() {
                self.ntfy.topic = topic;
            }
        }
        if let Ok(token) = std::env::var("FOLIO_APPROVAL_TOKEN") {
            if !token.is_empty() {
                self.approval.token = Some(token);
            }
        }
    }

    /// Expand `~` and environment variables in configured paths.
    pub fn expand_paths(&mut self) {
        fn expand(path: &mut PathBuf) {
            if let Some(s) = path.to_str() {
                if let Ok(expanded) = shellexpand::full(s) {
                    *path = PathBuf::from(expanded.as_ref());
                }
            }
        }

        expand(&mut self.storage.base_path);
        expand(&mut self.hugo.site_dir);
        expand(&mut self.hugo.public_dir);
        expand(&mut self.hugo.mirror_dir);
        if let Some(ref mut p) = self.storage.aliases_file {
            expand(p);
        }
        if let Some(ref mut p) = self.email.maildir {
            expand(p);
        }
        if let Some(ref mut p) = self.rsync.ssh_key {
            expand(p);
        }
    }

    /// Merge the aliases file (if configured) into the alias overrides.
    fn load_aliases_file(&mut self) -> Result<()> {
        let Some(ref path) = self.storage.aliases_file else {
            return Ok(());
        };

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let from_file: FolderAliases = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid aliases file {}: {e}", path.display())))?;

        for (language, table) in from_file {
            self.aliases.entry(language).or_default().extend(table);
        }
        Ok(())
    }

    /// The effective alias table: built-ins overlaid with configured aliases.
    pub fn folder_aliases(&self) -> FolderAliases {
        let mut aliases = builtin_aliases();
        for (language, table) in &self.aliases {
            aliases.entry(language.clone()).or_default().extend(table.clone());
        }
        aliases
    }

    /// Check that all required settings are present and consistent.
    pub fn validate(&self) -> Result<()> {
        if self.storage.base_path.as_os_str().is_empty() {
            return Err(Error::Config("storage.base_path is required".to_string()));
        }
        if self.storage.language.is_empty() {
            return Err(Error::Config("storage.language is required".to_string()));
        }
        if self.hugo.site_dir.as_os_str().is_empty() {
            return Err(Error::Config("hugo.site_dir is required".to_string()));
        }

        let aliases = self.folder_aliases();
        let table = aliases.get(&self.storage.language).ok_or_else(|| {
            Error::Config(format!("no folder aliases for language '{}'", self.storage.language))
        })?;
        for status in Status::ALL {
            if table.get(status.name()).map_or(true, |f| f.trim().is_empty()) {
                return Err(Error::UnmappedStatus {
                    status: status.name().to_string(),
                    language: self.storage.language.clone(),
                });
            }
        }

        if self.ntfy.enabled && self.ntfy.topic.is_empty() {
            return Err(Error::Config("ntfy.topic is required when ntfy is enabled".to_string()));
        }
        if self.email.enabled && (self.email.to.is_empty() || self.email.from.is_empty()) {
            return Err(Error::Config("email.from and email.to are required when email is enabled".to_string()));
        }
        if self.email.enabled && self.email.sendmail.is_empty() {
            return Err(Error::Config("email.sendmail must name a command".to_string()));
        }
        if self.rsync.enabled && (self.rsync.host.is_empty() || self.rsync.target_path.is_empty()) {
            return Err(Error::Config("rsync.host and rsync.target_path are required when rsync is enabled".to_string()));
        }
        if self.git.auto_commit && self.git.mirror_repo.is_empty() {
            return Err(Error::Config("git.mirror_repo is required when git.auto_commit is set".to_string()));
        }

        Ok(())
    }

    /// Directory that holds approval previews.
    pub fn preview_dir(&self) -> PathBuf {
        self.storage.base_path.join(&self.storage.preview_folder)
    }

    /// File that persists the pending approvals.
    pub fn pending_file(&self) -> PathBuf {
        self.storage.base_path.join(".pending_approvals.json")
    }

    /// Base URL used in decision links.
    pub fn public_url(&self) -> String {
        self.approval
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.approval.host, self.approval.port))
            .trim_end_matches('/')
            .to_string()
    }
}

/// Built-in Danish and English folder names.
pub fn builtin_aliases() -> FolderAliases {
    fn table(pairs: [(&str, &str); 6]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    let mut aliases = HashMap::new();
    aliases.insert(
        "da".to_string(),
        table([
            ("draft", "kladde"),
            ("revision", "afventer-rettelser"),
            ("publish", "udgiv"),
            ("published", "udgivet"),
            ("rejected", "afvist"),
            ("update", "opdater"),
        ]),
    );
    aliases.insert(
        "en".to_string(),
        table([
            ("draft", "drafts"),
            ("revision", "awaiting-revision"),
            ("publish", "publish"),
            ("published", "published"),
            ("rejected", "rejected"),
            ("update", "update"),
        ]),
    );
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn minimal() -> Config {
        Config::from_toml(
            r#"
            [storage]
            base_path = "/tmp/folio"

            [hugo]
            site_dir = "/tmp/site"
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.language, "da");
        assert_eq!(config.watcher.debounce_ms, 500);
        assert_eq!(config.watcher.rescan_secs, 120);
        assert_eq!(config.approval.port, 8080);
        assert!(!config.ntfy.enabled);
        assert_eq!(config.timeouts.build(), Duration::from_secs(300));
    }

    #[test]
    fn test_minimal_config_validates() {
        let config = minimal();
        config.validate().unwrap();
        assert_eq!(config.pending_file(), PathBuf::from("/tmp/folio/.pending_approvals.json"));
        assert_eq!(config.preview_dir(), PathBuf::from("/tmp/folio/godkendelse"));
        assert_eq!(config.public_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_missing_base_path_is_fatal() {
        let config = Config::from_toml("[hugo]\nsite_dir = \"/tmp/site\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.base_path"));
    }

    #[test]
    fn test_unknown_language_is_fatal() {
        let mut config = minimal();
        config.storage.language = "fr".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_incomplete_alias_table_is_fatal() {
        let mut config = minimal();
        config.storage.language = "de".to_string();
        config.aliases.insert(
            "de".to_string(),
            [("draft".to_string(), "entwurf".to_string())].into_iter().collect(),
        );
        assert!(matches!(config.validate(), Err(Error::UnmappedStatus { .. })));
    }

    #[test]
    fn test_alias_override() {
        let config = Config::from_toml(
            r#"
            [storage]
            base_path = "/tmp/folio"

            [hugo]
            site_dir = "/tmp/site"

            [aliases.da]
            draft = "udkast"
        "#,
        )
        .unwrap();

        let aliases = config.folder_aliases();
        assert_eq!(aliases["da"]["draft"], "udkast");
        assert_eq!(aliases["da"]["publish"], "udgiv");
    }

    #[test]
    fn test_ntfy_requires_topic() {
        let mut config = minimal();
        config.ntfy.enabled = true;
        assert!(config.validate().is_err());
        config.ntfy.topic = "editors".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_public_url_trailing_slash() {
        let mut config = minimal();
        config.approval.public_url = Some("https://review.example.com/".to_string());
        assert_eq!(config.public_url(), "https://review.example.com");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("FOLIO_NTFY_TOPIC", "from-env");
        std::env::set_var("FOLIO_APPROVAL_TOKEN", "s3cret");

        let mut config = minimal();
        config.apply_env_overrides();
        assert_eq!(config.ntfy.topic, "from-env");
        assert_eq!(config.approval.token.as_deref(), Some("s3cret"));

        std::env::remove_var("FOLIO_NTFY_TOPIC");
        std::env::remove_var("FOLIO_APPROVAL_TOKEN");
    }

    #[test]
    #[serial]
    fn test_expand_home() {
        std::env::set_var("FOLIO_TEST_ROOT", "/srv/articles");
        let mut config = minimal();
        config.storage.base_path = PathBuf::from("$FOLIO_TEST_ROOT/tree");
        config.expand_paths();
        assert_eq!(config.storage.base_path, PathBuf::from("/srv/articles/tree"));
        std::env::remove_var("FOLIO_TEST_ROOT");
    }

    #[test]
    fn test_aliases_file_merged() {
        let dir = tempfile::TempDir::new().unwrap();
        let aliases = dir.path().join("folder-aliases.yaml");
        std::fs::write(
            &aliases,
            "sv:\n  draft: utkast\n  revision: revidering\n  publish: publicera\n  published: publicerad\n  rejected: avvisad\n  update: uppdatera\n",
        )
        .unwrap();

        let mut config = minimal();
        config.storage.language = "sv".to_string();
        config.storage.aliases_file = Some(aliases);
        config.load_aliases_file().unwrap();
        config.validate().unwrap();
        assert_eq!(config.folder_aliases()["sv"]["publish"], "publicera");
    }
}
