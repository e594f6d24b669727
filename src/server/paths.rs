//! Resolution of request paths against a root directory.

use crate::error::{SearchError, SearchResult};
use std::path::{Component, Path, PathBuf};

/// Resolve `requested` (a `/`-separated path from the URL) to a file under
/// `root`.
///
/// The request is rejected with `PathTraversal` if it is absolute, has a
/// `..` component, contains a backslash or NUL, or if its canonical
/// location (after following symlinks) lies outside the canonical root.
/// A path that does not name an existing regular file is `NotFound`.
pub fn resolve_document_path(root: &Path, requested: &str) -> SearchResult<PathBuf> {
    let traversal = || SearchError::PathTraversal {
        path: requested.to_string(),
    };
    let not_found = || SearchError::NotFound {
        path: requested.to_string(),
    };

    if requested.contains('\\') || requested.contains('\0') {
        return Err(traversal());
    }

    let mut relative = PathBuf::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(traversal());
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(not_found());
    }

    let canonical_root = root.canonicalize().map_err(|e| {
        tracing::error!("Content root {} is unavailable: {e}", root.display());
        not_found()
    })?;
    let canonical = root
        .join(&relative)
        .canonicalize()
        .map_err(|_| not_found())?;

    if !canonical.starts_with(&canonical_root) {
        tracing::warn!("Rejected symlink escape for {requested:?}");
        return Err(traversal());
    }
    if !canonical.is_file() {
        return Err(not_found());
    }

    Ok(canonical)
}
