//! Embedding vectors: types, the embedder contract, and similarity math.
//!
//! # Architecture
//! Documents and queries are embedded by an [`Embedder`]. Vectors are plain
//! `Vec<f32>`; the [`VectorDimension`] newtype carries the dimension check
//! and [`Score`] carries a validated cosine similarity.

mod embedding;
mod similarity;
mod types;

#[cfg(test)]
pub use embedding::MockEmbedder;
pub use embedding::{Embedder, FastEmbedGenerator, model_to_string, parse_embedding_model};
pub(crate) use similarity::cosine_with_magnitudes;
pub use similarity::{cosine_similarity, dot, l2_normalize, magnitude};
pub use types::{Score, VectorDimension, VectorError};
