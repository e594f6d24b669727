//! Startup index build: walk the corpus, embed every document, freeze.
//!
//! A document that cannot be read or embedded is skipped and recorded in
//! the [`BuildReport`]; the rest of the corpus is still indexed.

use crate::config::Settings;
use crate::error::{SearchError, SearchResult};
use crate::index::{CorpusWalker, DocumentId, IndexBuilder, VectorIndex};
use crate::vector::Embedder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// A document left out of the index and why.
#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one index build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Documents stored in the index
    pub indexed: usize,
    /// Documents found but not stored
    pub skipped: Vec<SkippedDocument>,
    pub elapsed: Duration,
}

impl BuildReport {
    fn skip(&mut self, path: PathBuf, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Skipping {}: {reason}", path.display());
        self.skipped.push(SkippedDocument { path, reason });
    }
}

struct PendingDocument {
    id: DocumentId,
    path: PathBuf,
    text: String,
}

/// Build the vector index for every document under `root`.
///
/// Documents are embedded in batches of `indexing.batch_size`, batches run
/// in parallel on a pool of `indexing.parallel_threads` threads, and results
/// are inserted into the index on the calling thread. If a whole batch
/// fails, its documents are retried one at a time so a single bad document
/// only costs itself.
///
/// # Errors
/// Fails only if `root` itself cannot be read as a directory.
pub fn build_index(
    root: &Path,
    settings: &Settings,
    embedder: &dyn Embedder,
) -> SearchResult<(VectorIndex, BuildReport)> {
    let started = Instant::now();
    ensure_directory(root)?;

    let walker = CorpusWalker::new(&settings.indexing);
    let files = walker.walk(root);
    tracing::info!(
        "Indexing {} documents under {}",
        files.len(),
        root.display()
    );

    let mut report = BuildReport::default();
    let documents = read_documents(root, files, &mut report);

    let normalize = settings.embedding.normalize;
    let batch_size = settings.indexing.batch_size.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.indexing.parallel_threads.max(1))
        .thread_name(|i| format!("ragrepo-embed-{i}"))
        .build()
        .map_err(|e| SearchError::Internal(format!("Failed to start embedding pool: {e}")))?;

    let embedded: Vec<Vec<(usize, Result<Vec<f32>, String>)>> = pool.install(|| {
        documents
            .par_chunks(batch_size)
            .enumerate()
            .map(|(batch_no, batch)| embed_batch(embedder, batch, batch_no * batch_size, normalize))
            .collect()
    });

    let mut builder = IndexBuilder::with_dimension(embedder.dimension());
    for (position, result) in embedded.into_iter().flatten() {
        let document = &documents[position];
        match result {
            Ok(vector) => {
                if let Err(e) = builder.insert(document.id.clone(), vector) {
                    report.skip(document.path.clone(), e.to_string());
                }
            }
            Err(reason) => report.skip(document.path.clone(), reason),
        }
    }

    let index = builder.finish();
    report.indexed = index.len();
    report.elapsed = started.elapsed();
    tracing::info!(
        "Indexed {} documents ({} skipped) in {:.2}s",
        report.indexed,
        report.skipped.len(),
        report.elapsed.as_secs_f64()
    );

    Ok((index, report))
}

fn ensure_directory(root: &Path) -> SearchResult<()> {
    let metadata = std::fs::metadata(root).map_err(|source| SearchError::CorpusRead {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(SearchError::CorpusRead {
            path: root.to_path_buf(),
            source: std::io::Error::other("corpus root is not a directory"),
        });
    }
    Ok(())
}

fn read_documents(
    root: &Path,
    files: Vec<PathBuf>,
    report: &mut BuildReport,
) -> Vec<PendingDocument> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let Some(id) = DocumentId::from_path(root, &path) else {
            report.skip(path, "path is not valid UTF-8 or not under the corpus root");
            continue;
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => documents.push(PendingDocument { id, path, text }),
            Err(source) => {
                let error = SearchError::CorpusRead {
                    path: path.clone(),
                    source,
                };
                report.skip(path, error.to_string());
            }
        }
    }
    documents
}

/// Embed one batch; returns `(position in documents, result)` pairs.
fn embed_batch(
    embedder: &dyn Embedder,
    batch: &[PendingDocument],
    offset: usize,
    normalize: bool,
) -> Vec<(usize, Result<Vec<f32>, String>)> {
    let texts: Vec<&str> = batch.iter().map(|doc| doc.text.as_str()).collect();

    match embedder.embed_batch(&texts, normalize) {
        Ok(vectors) if vectors.len() == batch.len() => vectors
            .into_iter()
            .enumerate()
            .map(|(i, vector)| (offset + i, Ok(vector)))
            .collect(),
        Ok(vectors) => {
            tracing::debug!(
                "Batch at {offset} returned {} vectors for {} documents, retrying singly",
                vectors.len(),
                batch.len()
            );
            embed_singly(embedder, batch, offset, normalize)
        }
        Err(e) => {
            tracing::debug!("Batch at {offset} failed ({e}), retrying singly");
            embed_singly(embedder, batch, offset, normalize)
        }
    }
}

fn embed_singly(
    embedder: &dyn Embedder,
    batch: &[PendingDocument],
    offset: usize,
    normalize: bool,
) -> Vec<(usize, Result<Vec<f32>, String>)> {
    batch
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let result = embedder
                .embed(&doc.text, normalize)
                .map_err(|e| SearchError::from(e).to_string());
            (offset + i, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::MockEmbedder;
    use std::fs;
    use tempfile::TempDir;

    fn settings(batch_size: usize, threads: usize) -> Settings {
        let mut settings = Settings::default();
        settings.indexing.batch_size = batch_size;
        settings.indexing.parallel_threads = threads;
        settings
    }

    fn corpus() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("animals")).unwrap();
        fs::write(root.join("animals/cats.md"), "cats are mammals").unwrap();
        fs::write(root.join("finance.md"), "stock market rises").unwrap();
        fs::write(root.join("notes.txt"), "not a document").unwrap();
        temp_dir
    }

    #[test]
    fn test_build_indexes_every_document_with_relative_ids() {
        let temp_dir = corpus();
        let embedder = MockEmbedder::new(8);

        let (index, report) =
            build_index(temp_dir.path(), &settings(32, 2), &embedder).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(report.indexed, 2);
        assert!(report.skipped.is_empty());
        assert!(index.contains("animals/cats.md"));
        assert!(index.contains("finance.md"));

        // Stored with normalization enabled
        let vector = index.get("finance.md").unwrap();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_failed_document_is_skipped_not_fatal() {
        let temp_dir = corpus();
        let embedder = MockEmbedder::new(8).failing_on("stock market rises");

        // Batch of 1 doc per call and batch of both docs behave the same
        for batch_size in [1, 8] {
            let (index, report) =
                build_index(temp_dir.path(), &settings(batch_size, 2), &embedder).unwrap();

            assert_eq!(index.len(), 1, "batch_size {batch_size}");
            assert!(index.contains("animals/cats.md"));
            assert_eq!(report.skipped.len(), 1);
            assert!(report.skipped[0].path.ends_with("finance.md"));
            assert!(report.skipped[0].reason.contains("mock failure"));
        }
    }

    #[test]
    fn test_unreadable_document_is_skipped() {
        let temp_dir = corpus();
        // Invalid UTF-8 fails read_to_string
        fs::write(temp_dir.path().join("binary.md"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let embedder = MockEmbedder::new(8);

        let (index, report) = build_index(temp_dir.path(), &settings(4, 1), &embedder).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("binary.md"));
        assert!(report.skipped[0].reason.contains("Failed to read document"));
    }

    #[test]
    fn test_degenerate_embedding_is_skipped() {
        let temp_dir = corpus();
        fs::write(temp_dir.path().join("empty.md"), "").unwrap();
        // Empty text embeds to the zero vector, which cannot be normalized
        let embedder = MockEmbedder::new(8);

        let (index, report) = build_index(temp_dir.path(), &settings(4, 1), &embedder).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("zero magnitude"));
    }

    #[test]
    fn test_empty_corpus_builds_empty_index() {
        let temp_dir = TempDir::new().unwrap();
        let embedder = MockEmbedder::new(4);

        let (index, report) = build_index(temp_dir.path(), &settings(4, 1), &embedder).unwrap();
        assert!(index.is_empty());
        assert_eq!(report.indexed, 0);
        assert_eq!(embedder.calls(), 0);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let embedder = MockEmbedder::new(4);

        let result = build_index(&temp_dir.path().join("nope"), &settings(4, 1), &embedder);
        assert!(matches!(result, Err(SearchError::CorpusRead { .. })));
    }

    #[test]
    fn test_many_documents_across_batches() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..25 {
            fs::write(
                temp_dir.path().join(format!("doc{i:02}.md")),
                format!("document number {i}"),
            )
            .unwrap();
        }
        let embedder = MockEmbedder::new(16);

        let (index, report) = build_index(temp_dir.path(), &settings(4, 3), &embedder).unwrap();
        assert_eq!(index.len(), 25);
        assert!(report.skipped.is_empty());
        assert_eq!(embedder.calls(), 25);
    }
}
