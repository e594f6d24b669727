//! Embedding generation.
//!
//! The rest of the crate only talks to the [`Embedder`] trait. The
//! production implementation wraps a fastembed `TextEmbedding` model; tests
//! use a deterministic mock.
//!
//! fastembed needs `&mut` access to run inference, so the model sits behind
//! a `Mutex` and concurrent callers are served one at a time.

use crate::config::EmbeddingConfig;
use crate::vector::{VectorDimension, VectorError, l2_normalize};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, MutexGuard};

/// Trait for turning text into fixed-dimension vectors.
///
/// Implementations must be deterministic for identical input and safe to
/// call from several threads at once.
pub trait Embedder: Send + Sync {
    /// Generate embeddings for multiple texts, one vector per input in
    /// input order.
    ///
    /// When `normalize` is set every returned vector has unit L2 norm.
    fn embed_batch(&self, texts: &[&str], normalize: bool) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Generate a single embedding.
    fn embed(&self, text: &str, normalize: bool) -> Result<Vec<f32>, VectorError> {
        self.embed_batch(&[text], normalize)?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("model returned no embedding".to_string()))
    }

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Human readable model name, reported by `/ready`.
    fn model_name(&self) -> &str;
}

/// fastembed-backed embedder.
///
/// # Performance
/// - Batch processing: ~1-10ms per embedding on average for MiniLM
/// - Memory: dimension * 4 bytes per embedding
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
    model_name: String,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Create a generator with the default model (AllMiniLML6V2).
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn new() -> Result<Self, VectorError> {
        Self::from_config(&EmbeddingConfig::default())
    }

    /// Create a generator from the `[embedding]` settings section.
    ///
    /// The output dimension is probed with a test embedding, so any model
    /// fastembed supports works without a hardcoded dimension table.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, VectorError> {
        let model = parse_embedding_model(&config.model)?;

        let mut options =
            InitOptions::new(model.clone()).with_show_download_progress(config.show_download_progress);
        if let Some(cache_dir) = &config.cache_dir {
            options = options.with_cache_dir(cache_dir.clone());
        }

        tracing::info!("Loading embedding model {}", config.model);
        let mut text_model =
            TextEmbedding::try_new(options).map_err(|e| VectorError::ModelInit(e.to_string()))?;

        let probe = text_model
            .embed(vec!["test"], None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;
        let dimension = probe.first().map(Vec::len).unwrap_or(0);
        let dimension = VectorDimension::new(dimension)?;
        tracing::debug!("Embedding model ready, dimension {dimension}");

        Ok(Self {
            model: Mutex::new(text_model),
            dimension,
            model_name: model_to_string(&model),
        })
    }
}

impl Embedder for FastEmbedGenerator {
    fn embed_batch(&self, texts: &[&str], normalize: bool) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = lock_model(&self.model)
            .embed(texts.to_vec(), None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        if embeddings.len() != texts.len() {
            return Err(VectorError::EmbeddingFailed(format!(
                "Model returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        finish_embeddings(self.dimension, &mut embeddings, normalize)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Lock the model, recovering it if an earlier caller panicked mid-embed.
///
/// Inference keeps no state between calls, so a poisoned model is still
/// usable and one failed request must not disable search for good.
fn lock_model<T>(model: &Mutex<T>) -> MutexGuard<'_, T> {
    model.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Embedding model lock was poisoned by a panicked request, recovering");
        poisoned.into_inner()
    })
}

/// Check every vector's dimension and normalize when asked.
fn finish_embeddings(
    dimension: VectorDimension,
    embeddings: &mut [Vec<f32>],
    normalize: bool,
) -> Result<(), VectorError> {
    for embedding in embeddings.iter_mut() {
        dimension.validate_vector(embedding)?;
        if normalize {
            l2_normalize(embedding)?;
        }
    }
    Ok(())
}

/// Resolve a configured model name to a fastembed model.
///
/// Matching ignores case, dashes and underscores, so `all-minilm-l6-v2`
/// and `AllMiniLML6V2` name the same model.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let model = match key.as_str() {
        "allminilml6v2" => EmbeddingModel::AllMiniLML6V2,
        "allminilml12v2" => EmbeddingModel::AllMiniLML12V2,
        "bgesmallenv15" => EmbeddingModel::BGESmallENV15,
        "bgebaseenv15" => EmbeddingModel::BGEBaseENV15,
        "bgelargeenv15" => EmbeddingModel::BGELargeENV15,
        "multilinguale5small" => EmbeddingModel::MultilingualE5Small,
        "multilinguale5base" => EmbeddingModel::MultilingualE5Base,
        "nomicembedtextv15" => EmbeddingModel::NomicEmbedTextV15,
        _ => return Err(VectorError::UnknownModel(name.to_string())),
    };
    Ok(model)
}

/// Canonical settings name for a model.
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2",
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2",
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15",
        EmbeddingModel::BGEBaseENV15 => "BGEBaseENV15",
        EmbeddingModel::BGELargeENV15 => "BGELargeENV15",
        EmbeddingModel::MultilingualE5Small => "MultilingualE5Small",
        EmbeddingModel::MultilingualE5Base => "MultilingualE5Base",
        EmbeddingModel::NomicEmbedTextV15 => "NomicEmbedTextV15",
        other => return format!("{other:?}"),
    }
    .to_string()
}

/// Mock embedder for testing.
///
/// Texts registered with [`MockEmbedder::with_vector`] map to exactly that
/// vector. Anything else becomes a bag-of-words vector: each lowercase word
/// is hashed into one bucket. Texts listed with [`MockEmbedder::failing_on`]
/// produce an embedding error. Output goes through the same dimension check
/// and normalization as [`FastEmbedGenerator`], so the zero vector fails
/// with `ZeroMagnitude` when normalization is requested.
#[cfg(test)]
pub struct MockEmbedder {
    dimension: VectorDimension,
    fixed: std::collections::HashMap<String, Vec<f32>>,
    failing: Vec<String>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: VectorDimension::new(dimension).expect("non-zero test dimension"),
            fixed: std::collections::HashMap::new(),
            failing: Vec::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension.get());
        self.fixed.insert(text.to_string(), vector);
        self
    }

    #[must_use]
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.push(text.to_string());
        self
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn bag_of_words(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let mut embedding = vec![0.0; dim];
        for word in text.split_whitespace() {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(0usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                % dim;
            embedding[bucket] += 1.0;
        }
        embedding
    }
}

#[cfg(test)]
impl Embedder for MockEmbedder {
    fn embed_batch(&self, texts: &[&str], normalize: bool) -> Result<Vec<Vec<f32>>, VectorError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.failing.iter().any(|f| f == text) {
                return Err(VectorError::EmbeddingFailed(format!("mock failure for {text:?}")));
            }
            let embedding = self
                .fixed
                .get(*text)
                .cloned()
                .unwrap_or_else(|| self.bag_of_words(text));
            embeddings.push(embedding);
        }
        finish_embeddings(self.dimension, &mut embeddings, normalize)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
