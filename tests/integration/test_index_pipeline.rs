//! Index build and query through the public library API.

use crate::common::{StubEmbedder, TestProject};
use ragrepo::index::IGNORE_FILE_NAME;
use ragrepo::{SearchError, build_index};

#[test]
fn test_build_skips_ignored_and_foreign_files() {
    let project = TestProject::with_corpus();
    project.add_document("notes.txt", "cat");
    project.add_document("drafts/wip.md", "cat");
    project.add_document(IGNORE_FILE_NAME, "drafts/\n");
    let settings = project.settings();

    let (index, report) =
        build_index(&settings.content_root, &settings, &StubEmbedder).unwrap();

    let ids: Vec<&str> = index.ids().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["cats.md", "dogs.md", "guides/rust.md"]);
    assert_eq!(report.indexed, 3);
    assert!(report.skipped.is_empty());
}

#[test]
fn test_documents_without_signal_are_reported() {
    let project = TestProject::with_corpus();
    project.add_document("empty.md", "");
    let settings = project.settings();

    let (index, report) =
        build_index(&settings.content_root, &settings, &StubEmbedder).unwrap();

    assert_eq!(index.len(), 3);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("empty.md"));
}

#[test]
fn test_engine_ranks_self_match_first() {
    let project = TestProject::with_corpus();
    let settings = project.settings();
    let engine = project.engine(&settings);

    let results = engine.search("rust rust search").unwrap();
    assert_eq!(results[0].id.as_str(), "guides/rust.md");
    assert!((results[0].score.get() - 1.0).abs() < 1e-5);

    let results = engine.search_with_limit("cat", 2).unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn test_missing_root_is_an_error() {
    let project = TestProject::new();
    let mut settings = project.settings();
    settings.content_root = project.path().join("nope");

    let result = build_index(&settings.content_root, &settings, &StubEmbedder);
    assert!(matches!(result, Err(SearchError::CorpusRead { .. })));
}
