//! Sweep failure isolation across backends

mod common;

use std::sync::Arc;

use common::{FailingStore, RecordingStore, ScriptedLlm};
use rag_lab::config::ExperimentConfig;
use rag_lab::experiment::{read_rows, BackendPhase, SweepPlan};
use rag_lab::types::ReportRow;
use rag_lab::providers::{EmbeddingModel, HashingEmbedder, LocalVectorStore, VectorBackend};
use rag_lab::types::RunStage;
use rag_lab::{Document, ExperimentHarness};

fn plan() -> SweepPlan {
    plan_with(vec![3, 100], vec![0])
}

fn plan_with(chunk_sizes: Vec<usize>, overlaps: Vec<usize>) -> SweepPlan {
    SweepPlan::from_config(&ExperimentConfig {
        chunk_sizes,
        overlaps,
        prompts: vec!["Answer the question based on the context provided below:".to_string()],
        questions: vec!["When was Redis created?".to_string()],
        ..ExperimentConfig::default()
    })
}

fn documents() -> Vec<Document> {
    vec![Document::new(
        "redis.txt",
        vec!["Redis was created in 2009".to_string(), "Redis lists are ordered".to_string()],
    )]
}

#[tokio::test]
async fn test_failing_backend_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("experiment_results.csv");

    let local = BackendPhase::new(
        Arc::new(LocalVectorStore::open(dir.path().join("vectors.redb")).unwrap()),
        Arc::new(HashingEmbedder::default()),
        EmbeddingModel::Hashing,
    );
    let failing = BackendPhase::new(
        Arc::new(FailingStore),
        Arc::new(HashingEmbedder::default()),
        EmbeddingModel::Hashing,
    );

    let harness = ExperimentHarness::new(plan(), vec![Arc::new(ScriptedLlm::new("2009"))], &report)
        .with_memory_tracking(false);
    let outcome = harness.run(&documents(), &[local, failing]).await.unwrap();

    assert_eq!(outcome.runs.len(), 2);
    assert_eq!(outcome.failures.len(), 2);
    assert!(outcome
        .failures
        .iter()
        .all(|f| f.config.database == VectorBackend::Redis && f.stage == RunStage::Ingest));

    let rows = read_rows(&report).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.database == "local"));
    let chunk_sizes: Vec<usize> = rows.iter().map(|r| r.chunk_size).collect();
    assert_eq!(chunk_sizes, [3, 100]);
    assert!(rows.iter().all(|r| r.score.is_none()));
}

#[tokio::test]
async fn test_failing_backend_first_still_produces_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("experiment_results.csv");

    let failing = BackendPhase::new(
        Arc::new(FailingStore),
        Arc::new(HashingEmbedder::default()),
        EmbeddingModel::Hashing,
    );
    let local = BackendPhase::new(
        Arc::new(LocalVectorStore::open(dir.path().join("vectors.redb")).unwrap()),
        Arc::new(HashingEmbedder::default()),
        EmbeddingModel::Hashing,
    );

    let harness = ExperimentHarness::new(plan(), vec![Arc::new(ScriptedLlm::new("2009"))], &report)
        .with_memory_tracking(false);
    let outcome = harness.run(&documents(), &[failing, local]).await.unwrap();

    assert_eq!(outcome.runs.len(), 2);
    let rows = read_rows(&report).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.database == "local"));
}

#[tokio::test]
async fn test_index_is_cleared_between_chunkings() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordingStore::new(
        LocalVectorStore::open(dir.path().join("vectors.redb")).unwrap(),
    ));
    let phase = BackendPhase::new(store.clone(), Arc::new(HashingEmbedder::default()), EmbeddingModel::Hashing);

    let harness = ExperimentHarness::new(
        plan_with(vec![3, 100], vec![1, 0]),
        vec![Arc::new(ScriptedLlm::new("2009"))],
        dir.path().join("experiment_results.csv"),
    )
    .with_memory_tracking(false);
    let outcome = harness.run(&documents(), &[phase]).await.unwrap();
    assert_eq!(outcome.runs.len(), 4);

    // 9 tokens: size 3 overlap 1 gives 5 chunks, overlap 0 gives 3, size 100 gives 1.
    // Ids are reused across chunkings, so a missed clear would leave extra records.
    assert_eq!(store.sizes_at_query(), [5, 3, 1, 1]);
    let num_chunks: Vec<usize> = outcome.runs.iter().map(|r| r.num_chunks).collect();
    assert_eq!(num_chunks, [5, 3, 1, 1]);

    // once at phase start, after each overlap, after each chunk size
    assert_eq!(store.clears(), 1 + 4 + 2);
}

#[tokio::test]
async fn test_all_runs_failing_leaves_header_only_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("experiment_results.csv");
    let failing = BackendPhase::new(
        Arc::new(FailingStore),
        Arc::new(HashingEmbedder::default()),
        EmbeddingModel::Hashing,
    );

    let harness = ExperimentHarness::new(plan(), vec![Arc::new(ScriptedLlm::new("2009"))], &report)
        .with_memory_tracking(false);
    let outcome = harness.run(&documents(), &[failing]).await.unwrap();
    assert!(outcome.runs.is_empty());
    assert_eq!(outcome.failures.len(), 2);

    let content = std::fs::read_to_string(&report).unwrap();
    assert_eq!(content.trim_end(), ReportRow::COLUMNS.join(","));
    assert!(read_rows(&report).unwrap().is_empty());
}
