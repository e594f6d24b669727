#![allow(dead_code)]

use ragrepo::vector::{Embedder, VectorDimension, VectorError, l2_normalize};
use ragrepo::{SearchEngine, SearchOptions, Settings, build_index};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Words the stub embedder understands, one dimension each.
pub const VOCABULARY: [&str; 6] = ["cat", "dog", "rust", "python", "search", "deploy"];

/// Deterministic embedder counting vocabulary words.
///
/// Text without any vocabulary word embeds to the zero vector. Like the
/// fastembed generator, normalizing that vector fails with `ZeroMagnitude`.
#[derive(Debug, Default)]
pub struct StubEmbedder;

impl Embedder for StubEmbedder {
    fn embed_batch(&self, texts: &[&str], normalize: bool) -> Result<Vec<Vec<f32>>, VectorError> {
        texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; VOCABULARY.len()];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .map(str::to_lowercase)
                {
                    if let Some(slot) = VOCABULARY.iter().position(|v| *v == word) {
                        vector[slot] += 1.0;
                    }
                }
                if normalize {
                    l2_normalize(&mut vector)?;
                }
                Ok(vector)
            })
            .collect()
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(VOCABULARY.len()).unwrap()
    }

    fn model_name(&self) -> &str {
        "stub-vocabulary"
    }
}

/// [`StubEmbedder`] that takes `delay` per call.
#[derive(Debug)]
pub struct SlowEmbedder {
    pub delay: Duration,
}

impl Embedder for SlowEmbedder {
    fn embed_batch(&self, texts: &[&str], normalize: bool) -> Result<Vec<Vec<f32>>, VectorError> {
        std::thread::sleep(self.delay);
        StubEmbedder.embed_batch(texts, normalize)
    }

    fn dimension(&self) -> VectorDimension {
        StubEmbedder.dimension()
    }

    fn model_name(&self) -> &str {
        "stub-slow"
    }
}

pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("content")).expect("Failed to create content dir");
        fs::create_dir_all(dir.path().join("static")).expect("Failed to create static dir");
        Self { dir }
    }

    /// Small corpus used by most tests.
    pub fn with_corpus() -> Self {
        let project = Self::new();
        project.add_document("cats.md", "# Cats\n\ncat cat cat");
        project.add_document("dogs.md", "# Dogs\n\ndog dog dog");
        project.add_document("guides/rust.md", "# Rust\n\nrust rust search");
        project.add_file("static/style.css", "body { margin: 0; }");
        project
    }

    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn add_document(&self, path: &str, content: &str) -> PathBuf {
        self.add_file(&format!("content/{path}"), content)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.content_root = self.path().join("content");
        settings.static_root = self.path().join("static");
        settings.indexing.parallel_threads = 2;
        settings.indexing.batch_size = 2;
        settings
    }

    pub fn engine(&self, settings: &Settings) -> SearchEngine {
        self.engine_with(settings, Arc::new(StubEmbedder))
    }

    /// Index with [`StubEmbedder`], answer queries with `query_embedder`.
    pub fn engine_with(&self, settings: &Settings, query_embedder: Arc<dyn Embedder>) -> SearchEngine {
        let (index, _report) = build_index(&settings.content_root, settings, &StubEmbedder)
            .expect("Failed to build index");
        SearchEngine::new(
            Arc::new(index),
            query_embedder,
            SearchOptions::from_settings(settings),
        )
    }
}
