use super::*;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::config::{EmbeddingConfig, ModuleDecl};
use crate::embeddings::MockEmbedder;

fn write_corpus(corpus: &Path) {
    let m1 = corpus.join("module-1-physical-ai");
    fs::create_dir_all(&m1).expect("should create module dir");
    fs::write(
        m1.join("01-intro.md"),
        "# Introduction\n\nWhat physical AI is.\n\n## Key Ideas\n\nEmbodiment matters.",
    )
    .expect("should write chapter");
    fs::write(
        m1.join("02-sensors.md"),
        "# Sensors\n\nLidar and cameras.\n\n## Lidar Basics\n\nPoint clouds everywhere.",
    )
    .expect("should write chapter");

    let m2 = corpus.join("module-2-ros2");
    fs::create_dir_all(&m2).expect("should create module dir");
    fs::write(
        m2.join("01-nodes.md"),
        "# Nodes\n\nNodes exchange messages.\n\n## Topics Explained\n\nPublish and subscribe.",
    )
    .expect("should write chapter");
}

fn test_config(base_dir: &Path, corpus: &Path) -> Config {
    Config {
        embedding: EmbeddingConfig {
            batch_delay_ms: 0,
            ..EmbeddingConfig::default()
        },
        chunking: Default::default(),
        modules: vec![
            ModuleDecl {
                id: "module-1-physical-ai".to_string(),
                title: "Physical AI Foundations".to_string(),
            },
            ModuleDecl {
                id: "module-2-ros2".to_string(),
                title: "ROS2 Middleware".to_string(),
            },
        ],
        corpus_dir: Some(corpus.to_path_buf()),
        base_dir: base_dir.to_path_buf(),
    }
}

fn test_pipeline(base_dir: &Path, corpus: &Path, embedder: MockEmbedder) -> Pipeline {
    Pipeline::with_provider(test_config(base_dir, corpus), Box::new(embedder))
        .expect("should build pipeline")
}

#[test]
fn build_indexes_the_whole_corpus() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    let corpus = temp_dir.path().join("docs");
    write_corpus(&corpus);

    let mut pipeline = test_pipeline(temp_dir.path(), &corpus, MockEmbedder::new(32));
    let report = pipeline.build().expect("should build index");

    // Each chapter has a level-1 and a level-2 header, so two chunks.
    assert_eq!(report.chunks, 6);
    assert_eq!(report.placeholder_embeddings, 0);
    assert_eq!(report.modules, 2);
    assert_eq!(report.chapters, 3);
    assert!(report.words > 0);
    assert!(report.topics > 0);
    assert_eq!(pipeline.store().count(), 6);
}

#[test]
fn search_returns_display_ready_passages() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    let corpus = temp_dir.path().join("docs");
    write_corpus(&corpus);

    let mut pipeline = test_pipeline(temp_dir.path(), &corpus, MockEmbedder::new(32));
    pipeline.build().expect("should build index");

    let passages = pipeline
        .search("how do lidar sensors work", 3, None)
        .expect("should search");

    assert_eq!(passages.len(), 3);
    for passage in &passages {
        assert!(!passage.content.is_empty());
        assert!(passage.source.ends_with(".md"));
        assert!(!passage.chapter_title.is_empty());
        assert!(passage.module.starts_with("module-"));
        assert!(passage.score > 0.0 && passage.score <= 1.0);
    }

    // Sources resolve to citations through the metadata built alongside.
    let book = pipeline.book_context().expect("should load book context");
    for passage in &passages {
        assert!(book.citation(&passage.source).found);
    }
}

#[test]
fn module_filter_restricts_passages() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    let corpus = temp_dir.path().join("docs");
    write_corpus(&corpus);

    let mut pipeline = test_pipeline(temp_dir.path(), &corpus, MockEmbedder::new(32));
    pipeline.build().expect("should build index");

    let filter = SearchFilter::module("module-2-ros2");
    let passages = pipeline
        .search("nodes and topics", 10, Some(&filter))
        .expect("should search");

    assert!(!passages.is_empty());
    assert!(passages.iter().all(|p| p.module == "module-2-ros2"));
}

#[test]
fn rebuild_replaces_instead_of_appending() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    let corpus = temp_dir.path().join("docs");
    write_corpus(&corpus);

    let mut pipeline = test_pipeline(temp_dir.path(), &corpus, MockEmbedder::new(32));
    pipeline.build().expect("should build index");
    let count = pipeline.store().count();

    pipeline.build().expect("should rebuild index");
    assert_eq!(pipeline.store().count(), count);
}

#[test]
fn failed_embeddings_are_reported() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    let corpus = temp_dir.path().join("docs");
    write_corpus(&corpus);
    let m1 = corpus.join("module-1-physical-ai");
    fs::write(
        m1.join("03-poison.md"),
        "# Poison\n\nPOISON body that cannot be embedded.",
    )
    .expect("should write chapter");

    let embedder = MockEmbedder::new(32)
        .with_failing_batches()
        .with_fail_marker("POISON");
    let mut pipeline = test_pipeline(temp_dir.path(), &corpus, embedder);
    let report = pipeline.build().expect("should build index");

    assert_eq!(report.placeholder_embeddings, 1);
    assert_eq!(pipeline.store().count(), report.chunks);
}

#[test]
fn search_on_empty_index_is_empty() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    let corpus = temp_dir.path().join("docs");
    fs::create_dir_all(&corpus).expect("should create corpus dir");

    let pipeline = test_pipeline(temp_dir.path(), &corpus, MockEmbedder::new(32));
    let passages = pipeline.search("anything", 5, None).expect("should search");
    assert!(passages.is_empty());
}

#[test]
fn reset_empties_the_store() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    let corpus = temp_dir.path().join("docs");
    write_corpus(&corpus);

    let mut pipeline = test_pipeline(temp_dir.path(), &corpus, MockEmbedder::new(32));
    pipeline.build().expect("should build index");
    assert!(pipeline.store().count() > 0);

    pipeline.reset().expect("should reset");
    assert_eq!(pipeline.store().count(), 0);
}
