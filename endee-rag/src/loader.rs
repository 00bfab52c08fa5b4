//! Filesystem document source.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::{Document, INGESTED_AT_KEY, SOURCE_FILE_KEY};
use crate::error::{RagError, Result};

const DEFAULT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Loads `.txt` and `.md` files below a root directory as [`Document`]s.
///
/// Files are visited in sorted path order. A document's id is its path
/// relative to the root with `/` separators, so files with the same name in
/// different folders stay distinct. Bytes that are not valid UTF-8 are
/// replaced with `U+FFFD`.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryLoader {
    /// Create a loader for the directory at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
        }
    }

    /// Replace the accepted file extensions (without the leading dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(|e| e.into().to_ascii_lowercase()).collect();
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// List the files this loader would read, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the root is missing or not a directory.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(RagError::Configuration(format!(
                "document root {} is not a directory",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if self.accepts(entry.path()) {
                files.push(entry.into_path());
            } else {
                debug!(path = %entry.path().display(), "skipping unsupported file");
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load a single file as a document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be read.
    pub fn load_file(&self, path: &Path) -> Result<Document> {
        let bytes =
            fs::read(path).map_err(|source| RagError::Io { path: path.to_path_buf(), source })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let file_name =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| id.clone());

        debug!(document.id = %id, chars = text.chars().count(), "loaded document");
        Ok(Document::new(id, text)
            .with_metadata(SOURCE_FILE_KEY, file_name)
            .with_metadata(INGESTED_AT_KEY, Utc::now().to_rfc3339()))
    }

    /// Load every accepted file below the root.
    ///
    /// Unreadable files are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the root is missing or not a directory.
    pub fn load(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for path in self.discover()? {
            match self.load_file(&path) {
                Ok(document) => documents.push(document),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to load document"),
            }
        }
        info!(root = %self.root.display(), document_count = documents.len(), "loaded documents");
        Ok(documents)
    }
}
