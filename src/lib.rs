/// The main library module for ragrepo
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod render;
pub mod search;
pub mod server;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{SearchError, SearchResult};
pub use index::{BuildReport, DocumentId, VectorIndex, build_index};
pub use search::{RankedDocument, SearchEngine, SearchOptions, rank};
pub use vector::{Embedder, FastEmbedGenerator, Score, VectorDimension, VectorError};
