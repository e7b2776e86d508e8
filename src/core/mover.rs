//! Status-driven file placement.
//!
//! Every status maps to one folder under the base path. The router decides
//! where an article belongs and moves it there.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::article::{Article, Status};
use super::config::Config;
use super::error::{Error, Result};

/// Maps statuses to folders and relocates articles accordingly.
#[derive(Debug, Clone)]
pub struct StatusRouter {
    base_path: PathBuf,
    language: String,
    folders: HashMap<String, String>,
}

impl StatusRouter {
    /// Create a router for a base path and a single language's alias table.
    pub fn new(base_path: impl Into<PathBuf>, language: impl Into<String>, folders: HashMap<String, String>) -> Self {
        Self { base_path: base_path.into(), language: language.into(), folders }
    }

    /// Create a router from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let language = config.storage.language.clone();
        let folders = config
            .folder_aliases()
            .remove(&language)
            .ok_or_else(|| Error::Config(format!("no folder aliases for language '{language}'")))?;
        Ok(Self::new(config.storage.base_path.clone(), language, folders))
    }

    /// Root of the folder tree.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Folder for a status.
    pub fn folder_for(&self, status: Status) -> Result<PathBuf> {
        match self.folders.get(status.name()) {
            Some(folder) if !folder.trim().is_empty() => Ok(self.base_path.join(folder)),
            _ => Err(Error::UnmappedStatus { status: status.name().to_string(), language: self.language.clone() }),
        }
    }

    /// Move an article into the folder for its current status.
    ///
    /// A no-op when it is already there. Never overwrites a different file
    /// with the same name in the target folder.
    pub fn relocate(&self, article: &mut Article) -> Result<()> {
        let status = article
            .current_status()
            .ok_or_else(|| Error::InvalidStatus(article.status_name().to_string()))?;
        let target_dir = self.folder_for(status)?;
        fs::create_dir_all(&target_dir)?;

        let file_name = article.file_name().ok_or_else(|| Error::Format {
            path: article.file_path.clone(),
            reason: "path has no file name".to_string(),
        })?;
        let target = target_dir.join(file_name);

        if same_file(&article.file_path, &target) {
            return Ok(());
        }
        if target.exists() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", target.display()),
            )));
        }

        fs::rename(&article.file_path, &target)?;
        tracing::info!(
            id = %article.id(),
            from = %article.file_path.display(),
            to = %target.display(),
            status = %status,
            "Moved article"
        );
        article.file_path = target;
        Ok(())
    }

    /// Folders to watch: one per status, in status order.
    pub fn monitored_folders(&self) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        for status in Status::ALL {
            if let Ok(folder) = self.folder_for(status) {
                if !folders.contains(&folder) {
                    folders.push(folder);
                }
            }
        }
        folders
    }

    /// Create every monitored folder.
    pub fn ensure_folders(&self) -> Result<()> {
        for folder in self.monitored_folders() {
            fs::create_dir_all(&folder)?;
        }
        Ok(())
    }

    /// Find the document carrying an article ID anywhere in the watched folders.
    ///
    /// Read-only: documents without an ID are not assigned one here.
    pub fn find_by_id(&self, id: &str) -> Option<Article> {
        self.markdown_files().into_iter().find_map(|path| {
            let text = fs::read_to_string(&path).ok()?;
            match Article::parse_str(&text, &path) {
                Ok(article) if article.id() == id => Some(article),
                _ => None,
            }
        })
    }

    /// Every article document in the monitored folders.
    pub fn markdown_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for folder in self.monitored_folders() {
            let walker = walkdir::WalkDir::new(&folder).min_depth(1).max_depth(1).sort_by_file_name();
            for entry in walker.into_iter().filter_map(std::result::Result::ok) {
                if entry.file_type().is_file() && is_article_path(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        }
        files
    }
}

/// Whether a path looks like an article document: a visible `.md` file.
pub fn is_article_path(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| !n.starts_with('.'));
    visible && path.extension().is_some_and(|ext| ext == "md")
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::builtin_aliases;
    use tempfile::TempDir;

    fn router(dir: &TempDir) -> StatusRouter {
        StatusRouter::new(dir.path(), "da", builtin_aliases().remove("da").unwrap())
    }

    fn write_article(path: &Path, flag: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            path,
            format!("---\nid: '#ABCDEF'\ntitle: Test\nauthor: Me\nstatus:\n  {flag}: 1\n---\n\nBody\n"),
        )
        .unwrap();
    }

    #[test]
    fn test_folder_for() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        assert_eq!(router.folder_for(Status::Publish).unwrap(), dir.path().join("udgiv"));
        assert_eq!(router.folder_for(Status::Revision).unwrap(), dir.path().join("afventer-rettelser"));
    }

    #[test]
    fn test_unmapped_status() {
        let dir = TempDir::new().unwrap();
        let router = StatusRouter::new(dir.path(), "xx", HashMap::new());
        assert!(matches!(router.folder_for(Status::Draft), Err(Error::UnmappedStatus { .. })));
    }

    #[test]
    fn test_relocate_moves_file() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        let path = dir.path().join("kladde/story.md");
        write_article(&path, "publish");

        let mut article = Article::parse(&path).unwrap();
        router.relocate(&mut article).unwrap();

        let expected = dir.path().join("udgiv/story.md");
        assert_eq!(article.file_path, expected);
        assert!(expected.exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_relocate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        let path = dir.path().join("kladde/story.md");
        write_article(&path, "publish");

        let mut article = Article::parse(&path).unwrap();
        router.relocate(&mut article).unwrap();
        let after_first = article.file_path.clone();
        router.relocate(&mut article).unwrap();

        assert_eq!(article.file_path, after_first);
        assert!(after_first.exists());
    }

    #[test]
    fn test_relocate_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        let path = dir.path().join("kladde/story.md");
        write_article(&path, "publish");
        write_article(&dir.path().join("udgiv/story.md"), "publish");

        let mut article = Article::parse(&path).unwrap();
        let err = router.relocate(&mut article).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::AlreadyExists));
        assert!(path.exists());
    }

    #[test]
    fn test_relocate_unknown_status() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        let path = dir.path().join("kladde/story.md");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "---\nid: '#ABCDEF'\ntitle: T\nauthor: A\n---\nBody").unwrap();

        let mut article = Article::parse(&path).unwrap();
        assert!(matches!(router.relocate(&mut article), Err(Error::InvalidStatus(_))));
    }

    #[test]
    fn test_monitored_folders() {
        let dir = TempDir::new().unwrap();
        let folders = router(&dir).monitored_folders();
        assert_eq!(folders.len(), 6);
        assert_eq!(folders[0], dir.path().join("kladde"));
    }

    #[test]
    fn test_find_by_id() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        write_article(&dir.path().join("udgivet/story.md"), "published");
        write_article(&dir.path().join("kladde/.hidden.md"), "draft");

        let found = router.find_by_id("#ABCDEF").unwrap();
        assert_eq!(found.file_path, dir.path().join("udgivet/story.md"));
        assert!(router.find_by_id("#000000").is_none());
    }

    #[test]
    fn test_find_by_id_leaves_other_documents_untouched() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        let untagged = dir.path().join("kladde/untagged.md");
        fs::create_dir_all(untagged.parent().unwrap()).unwrap();
        let original = "---\ntitle: No ID\nauthor: Me\nstatus:\n  draft: 1\n---\n\nBody\n";
        fs::write(&untagged, original).unwrap();
        write_article(&dir.path().join("udgiv/story.md"), "publish");

        assert!(router.find_by_id("#ABCDEF").is_some());
        assert!(router.find_by_id("#000000").is_none());
        assert_eq!(fs::read_to_string(&untagged).unwrap(), original);
    }

    #[test]
    fn test_is_article_path() {
        assert!(is_article_path(Path::new("/a/story.md")));
        assert!(!is_article_path(Path::new("/a/.story.md")));
        assert!(!is_article_path(Path::new("/a/story.txt")));
        assert!(!is_article_path(Path::new("/a/story.md.swp")));
    }
}
