//! Top-k cosine ranking and the query pipeline.
//!
//! [`rank`] is a pure function over a query vector and a [`VectorIndex`].
//! [`SearchEngine`] adds query validation and embedding on top; it is
//! cheap to clone and shares the index and model through `Arc`.

use crate::config::Settings;
use crate::error::{SearchError, SearchResult};
use crate::index::{DocumentId, VectorIndex};
use crate::vector::{Embedder, Score, VectorError, cosine_with_magnitudes, magnitude};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDocument {
    pub id: DocumentId,
    pub score: Score,
}

/// Descending score, then ascending identifier.
///
/// Identifiers are unique, so this is a total order and equal scores always
/// come back in the same order no matter how the corpus was walked.
fn by_relevance(a: &RankedDocument, b: &RankedDocument) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Score every indexed document against `query` and return the best `k`.
///
/// Returns `min(k, index.len())` results ordered by [`by_relevance`].
///
/// # Errors
/// - `InvalidQuery` if `query` has zero magnitude or non-finite components
/// - `EmbedderFailure` if `query` does not match the index dimension
pub fn rank(query: &[f32], index: &VectorIndex, k: usize) -> SearchResult<Vec<RankedDocument>> {
    if query.iter().any(|x| !x.is_finite()) {
        return Err(SearchError::InvalidQuery {
            reason: "query embedding contains non-finite values".to_string(),
        });
    }
    let query_norm = magnitude(query);
    if query_norm == 0.0 {
        return Err(SearchError::InvalidQuery {
            reason: "query embedding has zero magnitude".to_string(),
        });
    }
    if let Some(dimension) = index.dimension() {
        dimension.validate_vector(query)?;
    }
    if k == 0 || index.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored = Vec::with_capacity(index.len());
    for (id, entry) in index.indexed() {
        let similarity = cosine_with_magnitudes(query, query_norm, &entry.values, entry.magnitude)
            .ok_or_else(|| SearchError::Internal(format!("degenerate vector stored for {id}")))?;
        scored.push(RankedDocument {
            id: id.clone(),
            score: Score::new(similarity)?,
        });
    }

    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_relevance);
        scored.truncate(k);
    }
    scored.sort_by(by_relevance);
    Ok(scored)
}

/// A query that embeds to the zero vector (or to garbage) is a bad query,
/// not a broken model. Normalizing embedders report it before `rank` can.
fn query_embedding_error(error: VectorError) -> SearchError {
    match error {
        VectorError::ZeroMagnitude | VectorError::NonFinite => SearchError::InvalidQuery {
            reason: format!("query embedding is degenerate: {error}"),
        },
        other => SearchError::EmbedderFailure(other),
    }
}

/// Per-query knobs, normally taken from [`Settings`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub normalize: bool,
    pub max_query_chars: usize,
    pub min_score: Option<f32>,
}

impl SearchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            top_k: settings.search.top_k,
            normalize: settings.embedding.normalize,
            max_query_chars: settings.search.max_query_chars,
            min_score: settings.search.min_score,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Embed-and-rank pipeline over a built index.
#[derive(Clone)]
pub struct SearchEngine {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    options: SearchOptions,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("documents", &self.index.len())
            .field("model", &self.embedder.model_name())
            .field("options", &self.options)
            .finish()
    }
}

impl SearchEngine {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, options: SearchOptions) -> Self {
        Self {
            index,
            embedder,
            options,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Search with the configured `top_k`.
    pub fn search(&self, query: &str) -> SearchResult<Vec<RankedDocument>> {
        self.search_with_limit(query, self.options.top_k)
    }

    /// Search returning at most `limit` documents.
    ///
    /// The query is embedded exactly as given; surrounding whitespace only
    /// matters for the emptiness check.
    pub fn search_with_limit(&self, query: &str, limit: usize) -> SearchResult<Vec<RankedDocument>> {
        self.validate_query(query)?;

        let query_vector = self
            .embedder
            .embed(query, self.options.normalize)
            .map_err(query_embedding_error)?;
        let mut results = rank(&query_vector, &self.index, limit)?;

        if let Some(min_score) = self.options.min_score {
            results.retain(|hit| hit.score.get() >= min_score);
        }

        tracing::debug!(
            "Query {:?} matched {} of {} documents",
            query,
            results.len(),
            self.index.len()
        );
        Ok(results)
    }

    fn validate_query(&self, query: &str) -> SearchResult<()> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery {
                reason: "query text is empty".to_string(),
            });
        }
        let length = query.chars().count();
        if length > self.options.max_query_chars {
            return Err(SearchError::InvalidQuery {
                reason: format!(
                    "query is {length} characters, the limit is {}",
                    self.options.max_query_chars
                ),
            });
        }
        Ok(())
    }
}
