//! Pending approval persistence.
//!
//! The pending set lives in memory behind a lock and is mirrored to an
//! indented JSON file. Every mutation writes the new set to disk before
//! the in-memory view changes, so a failed write leaves both untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::{Article, Error, Result};
use crate::publish::PreviewLocator;

/// An article waiting for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingArticle {
    /// Article ID
    pub id: String,

    /// Article as it was when approval was requested
    pub article: Article,

    /// Where the preview was built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewLocator>,

    /// Whether the editor has been notified
    pub notification_sent: bool,

    /// Whether the article has been approved
    #[serde(default)]
    pub approved: bool,

    /// Whether the article has been rejected
    #[serde(default)]
    pub rejected: bool,

    /// When approval was requested
    pub requested_at: DateTime<Utc>,
}

impl PendingArticle {
    /// Create a pending entry for an article whose notification went out.
    pub fn new(article: Article, preview: Option<PreviewLocator>) -> Self {
        Self {
            id: article.id().to_string(),
            article,
            preview,
            notification_sent: true,
            approved: false,
            rejected: false,
            requested_at: Utc::now(),
        }
    }
}

/// Map of pending articles keyed by article ID.
pub type PendingMap = BTreeMap<String, PendingArticle>;

/// Write-through repository of pending approvals.
#[derive(Debug)]
pub struct PendingStore {
    path: PathBuf,
    entries: RwLock<PendingMap>,
}

impl PendingStore {
    /// Load the pending set from disk. A missing file is an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                PendingMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            PendingMap::new()
        };

        tracing::debug!(path = %path.display(), count = entries.len(), "Loaded pending approvals");
        Ok(Self { path, entries: RwLock::new(entries) })
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a pending article.
    pub fn get(&self, id: &str) -> Option<PendingArticle> {
        self.entries.read().get(id).cloned()
    }

    /// Whether an approval notification already went out for an article.
    pub fn notification_sent(&self, id: &str) -> bool {
        self.entries.read().get(id).is_some_and(|p| p.notification_sent)
    }

    /// All pending articles, oldest request first.
    pub fn list(&self) -> Vec<PendingArticle> {
        let mut list: Vec<_> = self.entries.read().values().cloned().collect();
        list.sort_by_key(|p| p.requested_at);
        list
    }

    /// Number of pending articles.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Insert or replace a pending article.
    pub fn upsert(&self, pending: PendingArticle) -> Result<()> {
        let mut entries = self.entries.write();
        let mut candidate = entries.clone();
        candidate.insert(pending.id.clone(), pending);
        self.write(&candidate)?;
        *entries = candidate;
        Ok(())
    }

    /// Remove and return a pending article.
    ///
    /// Of several concurrent takes for one ID exactly one succeeds; the
    /// others get [`Error::NotFound`].
    pub fn take(&self, id: &str) -> Result<PendingArticle> {
        let mut entries = self.entries.write();
        let mut candidate = entries.clone();
        let taken = candidate.remove(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        self.write(&candidate)?;
        *entries = candidate;
        Ok(taken)
    }

    fn write(&self, entries: &PendingMap) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn article(id: &str) -> Article {
        let text = format!("---\nid: '{id}'\ntitle: Title {id}\nauthor: Me\nstatus:\n  publish: 1\n---\n\nBody\n");
        Article::parse_str(&text, Path::new("/articles/udgiv/a.md")).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = PendingStore::load(dir.path().join(".pending_approvals.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pending_approvals.json");
        let store = PendingStore::load(&path).unwrap();
        store.upsert(PendingArticle::new(article("#ABCDEF"), None)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"#ABCDEF\": {"));

        let reloaded = PendingStore::load(&path).unwrap();
        let entry = reloaded.get("#ABCDEF").unwrap();
        assert!(entry.notification_sent);
        assert_eq!(entry.article.file_path, PathBuf::from("/articles/udgiv/a.md"));
        assert_eq!(entry.article, article("#ABCDEF"));
    }

    #[test]
    fn test_take_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pending_approvals.json");
        let store = PendingStore::load(&path).unwrap();
        store.upsert(PendingArticle::new(article("#ABCDEF"), None)).unwrap();

        let taken = store.take("#ABCDEF").unwrap();
        assert_eq!(taken.id, "#ABCDEF");
        assert!(store.take("#ABCDEF").unwrap_err().is_not_found());
        assert!(PendingStore::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_state() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes every write fail.
        let path = dir.path().join("blocked");
        let store = PendingStore::load(dir.path().join("ok.json")).unwrap();
        store.upsert(PendingArticle::new(article("#ABCDEF"), None)).unwrap();

        let blocked = PendingStore { path: path.clone(), entries: RwLock::new(store.entries.read().clone()) };
        fs::create_dir_all(&path).unwrap();
        fs::create_dir_all(path.with_extension("json.tmp")).unwrap();

        assert!(blocked.take("#ABCDEF").is_err());
        assert!(blocked.get("#ABCDEF").is_some());
        assert!(blocked.upsert(PendingArticle::new(article("#123456"), None)).is_err());
        assert!(blocked.get("#123456").is_none());
    }

    #[test]
    fn test_concurrent_take_single_winner() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(PendingStore::load(dir.path().join("p.json")).unwrap());
        store.upsert(PendingArticle::new(article("#ABCDEF"), None)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.take("#ABCDEF").is_ok())
            })
            .collect();
        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_list_ordered_by_request() {
        let dir = TempDir::new().unwrap();
        let store = PendingStore::load(dir.path().join("p.json")).unwrap();
        let mut first = PendingArticle::new(article("#BBBBBB"), None);
        first.requested_at = Utc::now() - chrono::Duration::minutes(5);
        store.upsert(first).unwrap();
        store.upsert(PendingArticle::new(article("#AAAAAA"), None)).unwrap();

        let ids: Vec<_> = store.list().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["#BBBBBB", "#AAAAAA"]);
    }
}
