//! Document corpus indexing.
//!
//! At startup [`build_index`] walks the content root with a
//! [`CorpusWalker`], embeds every eligible document, and freezes the result
//! into a read-only [`VectorIndex`].

mod build;
mod store;
mod walker;

pub use build::{BuildReport, SkippedDocument, build_index};
pub use store::{DocumentId, IndexBuilder, InsertError, VectorIndex};
pub use walker::{CorpusWalker, IGNORE_FILE_NAME};
