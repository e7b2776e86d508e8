//! Article documents.
//!
//! An article is a Markdown file with a YAML front matter block:
//!
//! ```text
//! ---
//! id: '#3FA2C1'
//! title: Nyt fra redaktionen
//! author: Jane Doe
//! status:
//!   draft: 0
//!   revision: 0
//!   publish: 1
//!   published: 0
//!   rejected: 0
//!   update: 0
//! ---
//!
//! Body text...
//! ```
//!
//! On disk the workflow status is six `0/1` flags. In memory it is a single
//! [`Status`] value (or none), so setting a status always clears the others.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::error::{Error, Result};

/// Delimiter line around the front matter block.
const DELIMITER: &str = "---";

/// Workflow status of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Being written
    Draft,
    /// Sent back to the author for changes
    Revision,
    /// Ready for approval
    Publish,
    /// Approved and live
    Published,
    /// Rejected by the editor
    Rejected,
    /// Live article with changes awaiting approval
    Update,
}

impl Status {
    /// All statuses, in flag priority order (later entries win when a
    /// document carries several flags).
    pub const ALL: [Status; 6] = [
        Status::Draft,
        Status::Revision,
        Status::Publish,
        Status::Published,
        Status::Rejected,
        Status::Update,
    ];

    /// Get the status name used in front matter and alias tables.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Revision => "revision",
            Self::Publish => "publish",
            Self::Published => "published",
            Self::Rejected => "rejected",
            Self::Update => "update",
        }
    }

    /// Whether an article in this status waits for a human decision.
    pub fn needs_approval(&self) -> bool {
        matches!(self, Self::Publish | Self::Update)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.name() == s)
            .ok_or_else(|| Error::InvalidStatus(s.to_string()))
    }
}

/// Workflow state as stored in the `status:` block.
///
/// A document flagged both `rejected` and `update` is a rejected article the
/// author wants reconsidered; that request survives until it is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowState {
    /// The single active status, if any flag is set
    pub status: Option<Status>,
    /// Rejected article flagged `update` by its author
    pub resubmission_requested: bool,
}

impl WorkflowState {
    fn from_flags(flags: &StatusFlags) -> Self {
        if flags.rejected && flags.update {
            return Self { status: Some(Status::Rejected), resubmission_requested: true };
        }

        let status = Status::ALL.iter().copied().filter(|s| flags.is_set(*s)).last();
        Self { status, resubmission_requested: false }
    }

    fn to_flags(self) -> StatusFlags {
        let mut flags = StatusFlags::default();
        if let Some(status) = self.status {
            flags.set(status);
        }
        if self.resubmission_requested {
            flags.rejected = true;
            flags.update = true;
        }
        flags
    }
}

impl Serialize for WorkflowState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_flags().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkflowState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let flags = Option::<StatusFlags>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self::from_flags(&flags))
    }
}

/// The six on-disk status flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct StatusFlags {
    #[serde(default, serialize_with = "flag_out", deserialize_with = "flag_in")]
    draft: bool,
    #[serde(default, serialize_with = "flag_out", deserialize_with = "flag_in")]
    revision: bool,
    #[serde(default, serialize_with = "flag_out", deserialize_with = "flag_in")]
    publish: bool,
    #[serde(default, serialize_with = "flag_out", deserialize_with = "flag_in")]
    published: bool,
    #[serde(default, serialize_with = "flag_out", deserialize_with = "flag_in")]
    rejected: bool,
    #[serde(default, serialize_with = "flag_out", deserialize_with = "flag_in")]
    update: bool,
}

impl StatusFlags {
    fn is_set(&self, status: Status) -> bool {
        match status {
            Status::Draft => self.draft,
            Status::Revision => self.revision,
            Status::Publish => self.publish,
            Status::Published => self.published,
            Status::Rejected => self.rejected,
            Status::Update => self.update,
        }
    }

    fn set(&mut self, status: Status) {
        match status {
            Status::Draft => self.draft = true,
            Status::Revision => self.revision = true,
            Status::Publish => self.publish = true,
            Status::Published => self.published = true,
            Status::Rejected => self.rejected = true,
            Status::Update => self.update = true,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn flag_out<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

/// Accepts `1`/`0`, `true`/`false` and empty values.
fn flag_in<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Bool(b) => b,
        serde_yaml::Value::Number(n) => n.as_i64() == Some(1),
        serde_yaml::Value::String(s) => matches!(s.trim(), "1" | "true" | "yes"),
        _ => false,
    })
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Structured front matter of an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    /// Persistent article ID (`#` + 6 uppercase hex chars)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,

    /// Article title (required)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,

    /// Article author (required)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub author: String,

    /// Workflow status flags
    #[serde(default)]
    pub status: WorkflowState,

    /// SEO description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Image references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Video references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<String>,

    /// Audio references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio: Vec<String>,

    /// Explicit URL slug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    /// Categories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    /// Series name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    /// Favicon override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,

    /// App icon override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<String>,

    /// Keys this crate does not interpret, kept for the round trip
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A parsed article document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Front matter fields
    pub front_matter: FrontMatter,

    /// Body after the front matter block
    pub content: String,

    /// Backing file; changes when the article is relocated
    pub file_path: PathBuf,
}

impl Article {
    /// Parse an article from disk.
    ///
    /// Generates and writes back an ID when the document has none, so this
    /// may modify the file.
    pub fn parse(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut article = Self::parse_str(&text, path)?;

        if article.front_matter.id.is_empty() {
            article.front_matter.id = generate_id(&article.front_matter.title, &article.front_matter.author);
            article.persist()?;
            tracing::info!(id = %article.id(), path = %path.display(), "Assigned article ID");
        }

        Ok(article)
    }

    /// Parse an article from text without touching the filesystem.
    pub fn parse_str(text: &str, path: &Path) -> Result<Self> {
        let (yaml, body) = split_document(text).ok_or_else(|| Error::Format {
            path: path.to_path_buf(),
            reason: "missing --- delimiters".to_string(),
        })?;

        let front_matter: FrontMatter = if yaml.trim().is_empty() {
            FrontMatter::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| Error::Format {
                path: path.to_path_buf(),
                reason: format!("invalid front matter: {e}"),
            })?
        };

        if front_matter.title.trim().is_empty() {
            return Err(Error::Validation { path: path.to_path_buf(), field: "title" });
        }
        if front_matter.author.trim().is_empty() {
            return Err(Error::Validation { path: path.to_path_buf(), field: "author" });
        }

        Ok(Self { front_matter, content: body.to_string(), file_path: path.to_path_buf() })
    }

    /// Render the document text (front matter block followed by the body).
    pub fn render(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(&self.front_matter)?;
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n\n{}", self.content))
    }

    /// Write the article back to its file.
    pub fn persist(&self) -> Result<()> {
        fs::write(&self.file_path, self.render()?)?;
        Ok(())
    }

    /// Article ID.
    pub fn id(&self) -> &str {
        &self.front_matter.id
    }

    /// Article title.
    pub fn title(&self) -> &str {
        &self.front_matter.title
    }

    /// Article author.
    pub fn author(&self) -> &str {
        &self.front_matter.author
    }

    /// The active status, or `None` when no flag is set.
    pub fn current_status(&self) -> Option<Status> {
        self.front_matter.status.status
    }

    /// Name of the active status, `"unknown"` when none is set.
    pub fn status_name(&self) -> &'static str {
        self.current_status().map_or("unknown", |s| s.name())
    }

    /// Whether the author flagged a rejected article for another review.
    pub fn resubmission_requested(&self) -> bool {
        self.front_matter.status.resubmission_requested
    }

    /// Replace the status, clearing every other flag.
    pub fn set_status(&mut self, status: Status) {
        self.front_matter.status = WorkflowState { status: Some(status), resubmission_requested: false };
    }

    /// Replace the status by name.
    pub fn update_status(&mut self, name: &str) -> Result<()> {
        let status = name.parse()?;
        self.set_status(status);
        Ok(())
    }

    /// URL slug for this article.
    pub fn slug(&self) -> String {
        match self.front_matter.slug.as_deref() {
            Some(explicit) if !explicit.trim().is_empty() => slugify(explicit),
            _ => slugify(&self.front_matter.title),
        }
    }

    /// File name of the backing document.
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.file_path.file_name()
    }
}

/// Split a document into its front matter and body.
///
/// The first line must be the delimiter; the block ends at the next line that
/// consists only of the delimiter. Blank lines between that line and the body
/// are not part of the body.
fn split_document(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_line_end = text.find('\n')?;
    if text[..first_line_end].trim_end() != DELIMITER {
        return None;
    }

    let rest = &text[first_line_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let body = &rest[offset + line.len()..];
            return Some((&rest[..offset], body.trim_start_matches(['\r', '\n'])));
        }
        offset += line.len();
    }

    None
}

/// Generate a new article ID from title, author and the current time.
fn generate_id(title: &str, author: &str) -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);

    let digest = Sha256::digest(format!("{title}|{author}|{nanos}").as_bytes());
    let hex: String = digest.iter().take(3).map(|b| format!("{b:02X}")).collect();
    format!("#{hex}")
}

/// Turn a title into a URL slug.
///
/// Lowercases, replaces spaces with hyphens, transliterates `æ`, `ø` and `å`,
/// and drops every character outside `[a-z0-9-]`.
pub fn slugify(input: &str) -> String {
    input
        .to_lowercase()
        .replace(' ', "-")
        .replace('æ', "ae")
        .replace('ø', "oe")
        .replace('å', "aa")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "---
id: '#ABC123'
title: Test Article
author: Jane Doe
status:
  draft: 0
  revision: 0
  publish: 1
  published: 0
  rejected: 0
  update: 0
tags:
  - news
date: 2024-05-01
---

# Heading

Body text.
";

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_parse_article() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.md", SAMPLE);

        let article = Article::parse(&path).unwrap();
        assert_eq!(article.id(), "#ABC123");
        assert_eq!(article.title(), "Test Article");
        assert_eq!(article.author(), "Jane Doe");
        assert_eq!(article.current_status(), Some(Status::Publish));
        assert_eq!(article.front_matter.tags, vec!["news"]);
        assert!(article.content.starts_with("# Heading"));
        assert_eq!(article.file_path, path);
    }

    #[test]
    fn test_missing_delimiters_is_format_error() {
        let err = Article::parse_str("title: x\nauthor: y\n", Path::new("x.md")).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));

        let err = Article::parse_str("---\ntitle: x\nauthor: y\n", Path::new("x.md")).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_missing_author_is_validation_error() {
        let err = Article::parse_str("---\ntitle: x\n---\nbody", Path::new("x.md")).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "author", .. }));

        let err = Article::parse_str("---\nauthor: y\ntitle:\n---\nbody", Path::new("x.md")).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "title", .. }));
    }

    #[test]
    fn test_id_generated_and_persisted() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "new.md", "---\ntitle: Hello\nauthor: Me\n---\n\nBody\n");

        let article = Article::parse(&path).unwrap();
        let id = article.id().to_string();
        assert_eq!(id.len(), 7);
        assert!(id.starts_with('#'));
        assert!(id[1..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        let reparsed = Article::parse(&path).unwrap();
        assert_eq!(reparsed.id(), id);
        assert_eq!(reparsed.content, "Body\n");
    }

    #[test]
    fn test_round_trip_preserves_body_and_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.md", SAMPLE);

        let first = Article::parse(&path).unwrap();
        first.persist().unwrap();
        let second = Article::parse(&path).unwrap();

        assert_eq!(first.content, second.content);
        assert_eq!(first.front_matter, second.front_matter);
        assert!(second.front_matter.extra.contains_key("date"));
    }

    #[test]
    fn test_status_exclusivity() {
        let mut article = Article::parse_str(SAMPLE, Path::new("a.md")).unwrap();

        for name in ["draft", "rejected", "revision", "update", "published", "publish"] {
            article.update_status(name).unwrap();
            assert_eq!(article.status_name(), name);

            let rendered = article.render().unwrap();
            let reparsed = Article::parse_str(&rendered, Path::new("a.md")).unwrap();
            assert_eq!(reparsed.status_name(), name);
            assert_eq!(rendered.matches(": 1\n").count(), 1);
        }
    }

    #[test]
    fn test_invalid_status() {
        let mut article = Article::parse_str(SAMPLE, Path::new("a.md")).unwrap();
        let err = article.update_status("archived").unwrap_err();
        assert!(matches!(err, Error::InvalidStatus(ref s) if s == "archived"));
        assert_eq!(article.current_status(), Some(Status::Publish));
    }

    #[test]
    fn test_last_flag_wins_for_legacy_documents() {
        let text = "---\ntitle: t\nauthor: a\nstatus:\n  draft: 1\n  published: 1\n---\n";
        let article = Article::parse_str(text, Path::new("a.md")).unwrap();
        assert_eq!(article.current_status(), Some(Status::Published));
    }

    #[test]
    fn test_rejected_with_update_is_resubmission() {
        let text = "---\ntitle: t\nauthor: a\nstatus:\n  rejected: 1\n  update: 1\n---\n";
        let mut article = Article::parse_str(text, Path::new("a.md")).unwrap();
        assert_eq!(article.current_status(), Some(Status::Rejected));
        assert!(article.resubmission_requested());

        let rendered = article.render().unwrap();
        assert!(rendered.contains("rejected: 1"));
        assert!(rendered.contains("update: 1"));

        article.set_status(Status::Publish);
        assert!(!article.resubmission_requested());
        let rendered = article.render().unwrap();
        assert!(rendered.contains("update: 0"));
    }

    #[test]
    fn test_unknown_status() {
        let article = Article::parse_str("---\ntitle: t\nauthor: a\n---\n", Path::new("a.md")).unwrap();
        assert_eq!(article.current_status(), None);
        assert_eq!(article.status_name(), "unknown");
    }

    #[test]
    fn test_boolean_flags_accepted() {
        let text = "---\ntitle: t\nauthor: a\nstatus:\n  revision: true\n---\n";
        let article = Article::parse_str(text, Path::new("a.md")).unwrap();
        assert_eq!(article.current_status(), Some(Status::Revision));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Æbler på Øen"), "aebler-paa-oeen");
        assert_eq!(slugify("What's new?"), "whats-new");

        let slug = slugify("Café Å");
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert_eq!(slug, "caf-aa");
    }

    #[test]
    fn test_slugify_idempotent() {
        for input in ["Hello World", "Café Å", "Rød grød med fløde", "  spaced  out  ", "a-b-c"] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn test_explicit_slug_preferred() {
        let text = "---\ntitle: Some Title\nauthor: a\nslug: Custom Slug\n---\n";
        let article = Article::parse_str(text, Path::new("a.md")).unwrap();
        assert_eq!(article.slug(), "custom-slug");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("update".parse::<Status>().unwrap(), Status::Update);
        assert!("Draft".parse::<Status>().is_err());
        assert!(Status::Publish.needs_approval());
        assert!(Status::Update.needs_approval());
        assert!(!Status::Rejected.needs_approval());
    }
}
