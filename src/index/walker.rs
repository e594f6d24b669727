//! File system walker for discovering documents to index
//!
//! This module provides directory traversal with support for:
//! - .gitignore rules
//! - .ragrepoignore files
//! - Extension filtering
//! - Hidden file handling

use crate::config::IndexingConfig;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Custom ignore file honoured in every corpus directory.
pub const IGNORE_FILE_NAME: &str = ".ragrepoignore";

/// Walks a corpus root to find eligible documents
#[derive(Debug, Clone)]
pub struct CorpusWalker {
    extensions: Vec<String>,
    respect_gitignore: bool,
    include_hidden: bool,
}

impl CorpusWalker {
    /// Create a walker from the `[indexing]` settings section
    pub fn new(config: &IndexingConfig) -> Self {
        let extensions = config
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self {
            extensions,
            respect_gitignore: config.respect_gitignore,
            include_hidden: config.include_hidden,
        }
    }

    /// Whether a file name passes the document-eligibility predicate.
    pub fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
    }

    /// Walk a directory and return every eligible document, sorted by path.
    ///
    /// Sorting makes the build order, and therefore the build log, the same
    /// across runs regardless of directory enumeration order.
    pub fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut builder = WalkBuilder::new(root);

        builder
            .hidden(!self.include_hidden)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .parents(false) // Rules above the corpus root do not apply
            .follow_links(false)
            .max_depth(None)
            .require_git(false); // Allow gitignore to work in non-git directories

        if self.respect_gitignore {
            builder.add_custom_ignore_filename(IGNORE_FILE_NAME);
        }

        let mut files: Vec<PathBuf> = builder
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable corpus entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| self.is_document(path))
            .collect();

        files.sort();
        files
    }

    /// Count files that would be indexed (useful for dry runs)
    pub fn count_files(&self, root: &Path) -> usize {
        self.walk(root).len()
    }
}
