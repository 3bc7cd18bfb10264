//! Versioned document store
//!
//! Drafts and comments are markdown files whose names embed an explicit
//! version, e.g. `reviews/review(version3).md`. A saved version is never
//! overwritten, so earlier rounds stay available for comparison.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::DocumentError;

static RE_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(version(\d+)\)\.md$").unwrap());

/// Directory holding downloaded source documents
pub const PAPERS_DIR: &str = "papers";

/// Kind of versioned document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Literature review draft written by the writer
    Draft,
    /// Reviewer comments on a draft
    Comment,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "review",
            Self::Comment => "comment",
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Draft => "reviews",
            Self::Comment => "comments",
        }
    }

    /// Parse a tool argument (`review`/`draft`, `comment`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "review" | "reviews" | "draft" | "drafts" => Some(Self::Draft),
            "comment" | "comments" => Some(Self::Comment),
            _ => None,
        }
    }

    /// File name for `version`
    pub fn file_name(&self, version: u32) -> String {
        format!("{}(version{}).md", self.as_str(), version)
    }
}

/// Extract the version embedded in a document file name
pub fn parse_version(file_name: &str) -> Option<u32> {
    RE_VERSION
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Markdown documents under a working directory
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open a store rooted at `root`, creating the document directories
    pub fn open(root: &Path) -> Result<Self, DocumentError> {
        for dir in [
            DocumentKind::Draft.dir_name(),
            DocumentKind::Comment.dir_name(),
            PAPERS_DIR,
        ] {
            std::fs::create_dir_all(root.join(dir))?;
        }

        info!("Document store opened: {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a versioned document
    pub fn path_for(&self, kind: DocumentKind, version: u32) -> PathBuf {
        self.root.join(kind.dir_name()).join(kind.file_name(version))
    }

    pub fn papers_dir(&self) -> PathBuf {
        self.root.join(PAPERS_DIR)
    }

    /// Save `content` as `version`; existing versions are never replaced
    pub fn save(&self, kind: DocumentKind, version: u32, content: &str) -> Result<PathBuf, DocumentError> {
        let mut body = content.to_string();
        if !body.ends_with('\n') {
            body.push('\n');
        }

        let path = self.create_version(kind, version, |file| {
            file.write_all(body.as_bytes())?;
            file.sync_all()
        })?;

        info!("Saved {} version {} ({} bytes)", kind.as_str(), version, body.len());
        Ok(path)
    }

    /// Create the file for `version` and fill it with `write`
    ///
    /// A failed write removes the file again so the version stays free.
    fn create_version<F>(&self, kind: DocumentKind, version: u32, write: F) -> Result<PathBuf, DocumentError>
    where
        F: FnOnce(&mut std::fs::File) -> std::io::Result<()>,
    {
        let path = self.path_for(kind, version);

        // create_new makes the existence check and the write one step
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path);
        let mut file = match file {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DocumentError::VersionExists {
                    kind: kind.as_str(),
                    version,
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = write(&mut file) {
            drop(file);
            if let Err(cleanup) = std::fs::remove_file(&path) {
                warn!("Failed to remove partial {}: {}", path.display(), cleanup);
            }
            return Err(e.into());
        }

        Ok(path)
    }

    /// Load `version`, dropping the trailing newline added on save
    pub fn load(&self, kind: DocumentKind, version: u32) -> Result<String, DocumentError> {
        let path = self.path_for(kind, version);
        match std::fs::read_to_string(&path) {
            Ok(mut content) => {
                if content.ends_with('\n') {
                    content.pop();
                    if content.ends_with('\r') {
                        content.pop();
                    }
                }
                Ok(content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DocumentError::NotFound {
                kind: kind.as_str(),
                version,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Saved versions of `kind`, ascending
    pub fn list(&self, kind: DocumentKind) -> Result<Vec<(u32, PathBuf)>, DocumentError> {
        let dir = self.root.join(kind.dir_name());
        let mut versions = Vec::new();

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(kind.as_str()) {
                continue;
            }
            if let Some(version) = parse_version(&name) {
                versions.push((version, entry.path()));
            }
        }

        versions.sort_by_key(|(v, _)| *v);
        debug!("{} {} version(s) on disk", versions.len(), kind.as_str());
        Ok(versions)
    }

    /// Newest saved version of `kind`
    pub fn latest_version(&self, kind: DocumentKind) -> Result<Option<u32>, DocumentError> {
        Ok(self.list(kind)?.last().map(|(v, _)| *v))
    }

    /// Load the newest version, with its number
    pub fn load_latest(&self, kind: DocumentKind) -> Result<(u32, String), DocumentError> {
        let version = self
            .latest_version(kind)?
            .ok_or(DocumentError::Empty { kind: kind.as_str() })?;
        Ok((version, self.load(kind, version)?))
    }

    /// Identifiers of downloaded papers, sorted
    pub fn list_papers(&self) -> Result<Vec<String>, DocumentError> {
        let mut papers = Vec::new();
        let entries = match std::fs::read_dir(self.papers_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(papers),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("txt") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    papers.push(stem.to_string());
                }
            }
        }

        papers.sort();
        Ok(papers)
    }

    /// Snapshot of what is on disk, keyed by section title
    pub fn perceive(&self) -> Result<BTreeMap<String, String>, DocumentError> {
        let join_paths = |items: Vec<(u32, PathBuf)>| {
            items
                .iter()
                .map(|(_, p)| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            "Existing review versions".to_string(),
            join_paths(self.list(DocumentKind::Draft)?),
        );
        snapshot.insert(
            "Existing comments".to_string(),
            join_paths(self.list(DocumentKind::Comment)?),
        );
        snapshot.insert("Downloaded papers".to_string(), self.list_papers()?.join(", "));
        Ok(snapshot)
    }

    /// `perceive` rendered as markdown bullet lines
    pub fn perceive_text(&self) -> Result<String, DocumentError> {
        Ok(self
            .perceive()?
            .into_iter()
            .map(|(k, v)| format!("- {}: {}", k, if v.is_empty() { "(none)" } else { v.as_str() }))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (DocumentStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::open(temp.path()).unwrap();
        (store, temp)
    }

    #[test]
    fn test_file_names_and_version_parsing() {
        assert_eq!(DocumentKind::Draft.file_name(3), "review(version3).md");
        assert_eq!(DocumentKind::Comment.file_name(12), "comment(version12).md");
        assert_eq!(parse_version("review(version42).md"), Some(42));
        assert_eq!(parse_version("review.md"), None);
        assert_eq!(DocumentKind::parse("Draft"), Some(DocumentKind::Draft));
        assert_eq!(DocumentKind::parse("comments"), Some(DocumentKind::Comment));
        assert_eq!(DocumentKind::parse("essay"), None);
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let (store, _temp) = store();
        store.save(DocumentKind::Draft, 1, "first").unwrap();

        let err = store.save(DocumentKind::Draft, 1, "second").unwrap_err();
        assert!(matches!(err, DocumentError::VersionExists { version: 1, .. }));
        assert_eq!(store.load(DocumentKind::Draft, 1).unwrap(), "first");
    }

    #[test]
    fn test_failed_write_leaves_version_free() {
        let (store, _temp) = store();
        let err = store
            .create_version(DocumentKind::Draft, 3, |file| {
                file.write_all(b"# Half a dra")?;
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            })
            .unwrap_err();
        assert!(matches!(err, DocumentError::Io(_)));
        assert!(!store.path_for(DocumentKind::Draft, 3).exists());

        store.save(DocumentKind::Draft, 3, "# Full draft").unwrap();
        assert_eq!(store.load(DocumentKind::Draft, 3).unwrap(), "# Full draft");
    }

    #[test]
    fn test_missing_version_is_not_found() {
        let (store, _temp) = store();
        assert!(matches!(
            store.load(DocumentKind::Comment, 9),
            Err(DocumentError::NotFound { version: 9, .. })
        ));
        assert!(matches!(
            store.load_latest(DocumentKind::Comment),
            Err(DocumentError::Empty { .. })
        ));
    }

    #[test]
    fn test_list_sorts_numerically() {
        let (store, _temp) = store();
        for v in [10, 2, 1] {
            store.save(DocumentKind::Draft, v, &format!("v{}", v)).unwrap();
        }
        std::fs::write(store.root().join("reviews").join("notes.md"), "ignored").unwrap();

        let versions: Vec<u32> = store.list(DocumentKind::Draft).unwrap().into_iter().map(|(v, _)| v).collect();
        assert_eq!(versions, vec![1, 2, 10]);
        assert_eq!(store.load_latest(DocumentKind::Draft).unwrap(), (10, "v10".to_string()));
    }

    #[test]
    fn test_perceive_lists_artifacts() {
        let (store, _temp) = store();
        store.save(DocumentKind::Draft, 1, "draft").unwrap();
        std::fs::write(store.papers_dir().join("2401.00001.txt"), "text").unwrap();

        let snapshot = store.perceive().unwrap();
        assert!(snapshot["Existing review versions"].contains("review(version1).md"));
        assert_eq!(snapshot["Existing comments"], "");
        assert_eq!(snapshot["Downloaded papers"], "2401.00001");

        let text = store.perceive_text().unwrap();
        assert!(text.contains("- Existing comments: (none)"));
    }
}
