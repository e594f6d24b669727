//! In-memory vector index.
//!
//! [`IndexBuilder`] is the only way to put vectors in; [`IndexBuilder::finish`]
//! hands out a [`VectorIndex`] that has no mutating methods at all, so once
//! it is wrapped in an `Arc` any number of request handlers can read it
//! without locking.

use crate::vector::{VectorDimension, VectorError, magnitude};
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::path::{Component, Path};
use thiserror::Error;

/// Document identifier: path relative to the corpus root, `/`-separated.
///
/// The same string is the index key, the value returned by `/search`, and
/// the `<path>` accepted by `/content/<path>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Build the identifier for `path` found under `root`.
    ///
    /// Returns `None` if `path` is not inside `root`, is the root itself,
    /// or contains a component that is not valid UTF-8.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A stored vector together with its magnitude, computed once at insert.
#[derive(Debug, Clone)]
pub(crate) struct IndexedVector {
    pub(crate) values: Box<[f32]>,
    pub(crate) magnitude: f32,
}

/// Reasons a vector is refused by the builder.
#[derive(Error, Debug)]
pub enum InsertError {
    #[error("Document '{0}' is already indexed")]
    Duplicate(DocumentId),

    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// Immutable mapping from document identifier to embedding vector.
///
/// Iteration order is identifier order.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: BTreeMap<DocumentId, IndexedVector>,
    dimension: Option<VectorDimension>,
}

impl VectorIndex {
    /// An index with no documents.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Vector stored for `id`, if any.
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.entries.get(id).map(|entry| &*entry.values)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Alias of [`VectorIndex::len`].
    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension shared by every stored vector; `None` for an empty index
    /// built without an explicit dimension.
    pub fn dimension(&self) -> Option<VectorDimension> {
        self.dimension
    }

    /// Lazily iterate `(identifier, vector)` pairs in identifier order.
    pub fn entries(&self) -> impl Iterator<Item = (&DocumentId, &[f32])> + '_ {
        self.entries.iter().map(|(id, entry)| (id, &*entry.values))
    }

    /// Iterate identifiers in order.
    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> + '_ {
        self.entries.keys()
    }

    pub(crate) fn indexed(&self) -> impl Iterator<Item = (&DocumentId, &IndexedVector)> + '_ {
        self.entries.iter()
    }
}

/// Collects vectors for a [`VectorIndex`].
///
/// Every inserted vector must be finite, non-zero, and share one dimension;
/// the first insert fixes the dimension unless one was given up front.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    entries: BTreeMap<DocumentId, IndexedVector>,
    dimension: Option<VectorDimension>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder that only accepts vectors of `dimension`.
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self {
            entries: BTreeMap::new(),
            dimension: Some(dimension),
        }
    }

    /// Add one document. A refused document leaves the builder unchanged.
    pub fn insert(&mut self, id: DocumentId, vector: Vec<f32>) -> Result<(), InsertError> {
        if self.entries.contains_key(&id) {
            return Err(InsertError::Duplicate(id));
        }

        let dimension = match self.dimension {
            Some(dimension) => dimension,
            None => VectorDimension::new(vector.len())?,
        };
        dimension.validate_vector(&vector)?;

        if vector.iter().any(|x| !x.is_finite()) {
            return Err(VectorError::NonFinite.into());
        }
        let norm = magnitude(&vector);
        if norm == 0.0 {
            return Err(VectorError::ZeroMagnitude.into());
        }

        self.dimension = Some(dimension);
        self.entries.insert(
            id,
            IndexedVector {
                values: vector.into_boxed_slice(),
                magnitude: norm,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the collected vectors.
    pub fn finish(self) -> VectorIndex {
        VectorIndex {
            entries: self.entries,
            dimension: self.dimension,
        }
    }
}
