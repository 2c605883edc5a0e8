//! End-to-end pipeline tests: generated filings in, answers out.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::QaError;
use crate::pipeline::{no_data_message, QaEngine};
use crate::providers::EmbeddingProvider;
use crate::settings::QaSettings;

use super::fakes::{
    write_filing_pdf, BrokenEmbedder, CountingEmbedder, EchoGenerator, GatedEmbedder,
    HashEmbedder,
};

struct PipelineHarness {
    // Held so the directory outlives the engines built from it.
    _root: tempfile::TempDir,
    settings: QaSettings,
}

impl PipelineHarness {
    fn new() -> Self {
        Self::with_cache_capacity(5)
    }

    fn with_cache_capacity(capacity: usize) -> Self {
        let root = tempfile::tempdir().expect("create temp root");
        let mut settings = QaSettings::default();
        settings.documents_dir = root.path().join("downloaded_filings");
        settings.index_dir = root.path().join("vector_store");
        settings.cache_capacity = capacity;
        Self {
            _root: root,
            settings,
        }
    }

    fn engine(&self) -> QaEngine {
        self.engine_with_embedder(Arc::new(HashEmbedder))
    }

    fn engine_with_embedder(&self, embedder: Arc<dyn EmbeddingProvider>) -> QaEngine {
        QaEngine::new(&self.settings, embedder, Arc::new(EchoGenerator), None)
    }

    fn write_filing(&self, company: &str, file_name: &str, pages: &[&str]) {
        let dir: PathBuf = self.settings.documents_dir.join(company);
        std::fs::create_dir_all(&dir).expect("create company dir");
        write_filing_pdf(&dir.join(file_name), pages);
    }
}

#[tokio::test]
async fn end_to_end_ingest_then_ask() {
    let harness = PipelineHarness::new();
    harness.write_filing(
        "00445790",
        "annual-accounts.pdf",
        &["The company's net profit for the year was 250,000 GBP."],
    );

    let engine = harness.engine();
    let report = engine.ingest("00445790").await.expect("ingest succeeds");
    assert_eq!(report.documents, 1);
    assert_eq!(report.documents_with_text, 1);
    assert!(report.chunks >= 1);

    let answer = engine
        .ask("00445790", "What is the company's net profit?")
        .await
        .expect("ask succeeds");
    assert!(!answer.is_empty());
    assert!(answer.contains("net profit for the year was 250,000 GBP"));
    assert!(answer.contains("Question: What is the company's net profit?"));
}

#[tokio::test]
async fn company_without_documents_gets_no_data_message() {
    let harness = PipelineHarness::new();
    let engine = harness.engine();

    let answer = engine
        .ask("99999999", "What is the company's net profit?")
        .await
        .expect("no-data is an answer, not an error");
    assert_eq!(answer, no_data_message("99999999"));
}

#[tokio::test]
async fn ingest_without_documents_is_an_error() {
    let harness = PipelineHarness::new();
    let engine = harness.engine();

    let err = engine.ingest("99999999").await.unwrap_err();
    assert!(matches!(err, QaError::NoDocuments(_)));
}

#[tokio::test]
async fn answers_never_cross_companies() {
    let harness = PipelineHarness::new();
    harness.write_filing(
        "11111111",
        "accounts.pdf",
        &["ALPHA WIDGETS LTD manufactured widgets and reported revenue of 9m."],
    );
    harness.write_filing(
        "22222222",
        "accounts.pdf",
        &["BETA HAULAGE LTD operated lorries and reported revenue of 3m."],
    );

    let engine = harness.engine();
    engine.ingest("11111111").await.expect("ingest first");
    engine.ingest("22222222").await.expect("ingest second");

    let alpha = engine
        .ask("11111111", "What was the revenue?")
        .await
        .expect("first answer");
    assert!(alpha.contains("ALPHA WIDGETS"));
    assert!(!alpha.contains("BETA HAULAGE"));

    let beta = engine
        .ask("22222222", "What was the revenue?")
        .await
        .expect("second answer");
    assert!(beta.contains("BETA HAULAGE"));
    assert!(!beta.contains("ALPHA WIDGETS"));
}

#[tokio::test]
async fn reingesting_unchanged_documents_answers_identically() {
    let harness = PipelineHarness::new();
    harness.write_filing(
        "00445790",
        "accounts.pdf",
        &[
            "Directors report for the year.",
            "Net assets at year end stood at 1.2m.",
        ],
    );

    let engine = harness.engine();
    engine.ingest("00445790").await.expect("first ingest");
    let first = engine
        .ask("00445790", "What were the net assets?")
        .await
        .expect("first answer");

    engine.ingest("00445790").await.expect("second ingest");
    let second = engine
        .ask("00445790", "What were the net assets?")
        .await
        .expect("second answer");

    assert_eq!(first, second);
}

#[tokio::test]
async fn persisted_index_survives_process_restart() {
    let harness = PipelineHarness::new();
    harness.write_filing(
        "00445790",
        "accounts.pdf",
        &["Turnover for the period was 4.2m."],
    );

    let first_engine = harness.engine();
    first_engine.ingest("00445790").await.expect("ingest");
    let before = first_engine
        .ask("00445790", "What was the turnover?")
        .await
        .expect("answer before restart");

    // A fresh engine has an empty cache, so this exercises the disk load.
    let second_engine = harness.engine();
    let after = second_engine
        .ask("00445790", "What was the turnover?")
        .await
        .expect("answer after restart");

    assert_eq!(before, after);
}

#[tokio::test]
async fn eviction_only_drops_the_memory_copy() {
    let harness = PipelineHarness::with_cache_capacity(1);
    harness.write_filing("11111111", "a.pdf", &["ALPHA content about widgets."]);
    harness.write_filing("22222222", "b.pdf", &["BETA content about lorries."]);

    let engine = harness.engine();
    engine.ingest("11111111").await.expect("ingest first");
    // Capacity 1: this ingest evicts the first company's in-memory index.
    engine.ingest("22222222").await.expect("ingest second");

    let answer = engine
        .ask("11111111", "What does the filing mention?")
        .await
        .expect("evicted company still answerable from disk");
    assert!(answer.contains("ALPHA content"));
}

#[tokio::test]
async fn list_companies_reflects_published_indexes() {
    let harness = PipelineHarness::new();
    harness.write_filing("11111111", "a.pdf", &["Some filing text."]);
    harness.write_filing("22222222", "b.pdf", &["Other filing text."]);

    let engine = harness.engine();
    assert!(engine.list_tenants().await.expect("empty list").is_empty());

    engine.ingest("11111111").await.expect("ingest first");
    engine.ingest("22222222").await.expect("ingest second");

    let companies = engine.list_tenants().await.expect("list");
    assert_eq!(
        companies,
        vec!["11111111".to_string(), "22222222".to_string()]
    );
}

#[tokio::test]
async fn blank_input_is_rejected_before_any_work() {
    let harness = PipelineHarness::new();
    let engine = harness.engine();

    assert!(matches!(
        engine.ask("", "question").await.unwrap_err(),
        QaError::Input(_)
    ));
    assert!(matches!(
        engine.ask("00445790", "   ").await.unwrap_err(),
        QaError::Input(_)
    ));
    assert!(matches!(
        engine.ingest("../outside").await.unwrap_err(),
        QaError::Input(_)
    ));
}

#[tokio::test]
async fn embedding_failure_surfaces_as_provider_error_on_ingest() {
    let harness = PipelineHarness::new();
    harness.write_filing("00445790", "accounts.pdf", &["Some filing text."]);

    let engine = harness.engine_with_embedder(Arc::new(BrokenEmbedder));
    let err = engine.ingest("00445790").await.unwrap_err();
    assert!(matches!(err, QaError::Provider(_)));
}

#[tokio::test]
async fn failed_build_leaves_other_companies_untouched() {
    let harness = PipelineHarness::new();
    harness.write_filing("11111111", "a.pdf", &["ALPHA content about widgets."]);

    let engine = harness.engine();
    engine.ingest("11111111").await.expect("ingest good company");
    engine.ingest("99999999").await.unwrap_err();

    let answer = engine
        .ask("11111111", "What does the filing mention?")
        .await
        .expect("good company unaffected");
    assert!(answer.contains("ALPHA content"));
}

#[tokio::test]
async fn concurrent_asks_share_one_build() {
    let harness = PipelineHarness::new();
    harness.write_filing(
        "00445790",
        "accounts.pdf",
        &["Turnover for the period was 4.2m."],
    );

    let embedder = Arc::new(CountingEmbedder::new());
    let engine = harness.engine_with_embedder(embedder.clone());

    let (first, second) = tokio::join!(
        engine.ask("00445790", "What was the turnover?"),
        engine.ask("00445790", "What was the turnover?"),
    );
    let first = first.expect("first concurrent ask");
    let second = second.expect("second concurrent ask");
    assert_eq!(first, second);

    // One embed call for the build's single chunk batch plus one per
    // question: the second ask waited on the build lock and reused the
    // finished index instead of building its own.
    assert_eq!(embedder.calls(), 3);
}

#[tokio::test]
async fn ask_during_reingest_is_served_the_fresh_index() {
    let harness = PipelineHarness::new();
    harness.write_filing(
        "00445790",
        "accounts.pdf",
        &[
            "Turnover for 2023 was 4.2m.",
            "The auditors were Smith and Co.",
        ],
    );
    harness.engine().ingest("00445790").await.expect("initial ingest");

    let gate = Arc::new(GatedEmbedder::new());
    let engine = Arc::new(harness.engine_with_embedder(gate.clone()));

    // Warm the cache with the old index via a disk load.
    let warm = engine
        .ask("00445790", "Who were the auditors?")
        .await
        .expect("warm ask");
    assert!(warm.contains("Smith and Co"));

    // Replace the filing and start a rebuild that parks inside embedding.
    harness.write_filing(
        "00445790",
        "accounts.pdf",
        &[
            "Turnover for 2024 was 9.9m.",
            "The auditors were Jones and Partners.",
        ],
    );
    let ingest = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.ingest("00445790").await })
    };
    gate.wait_until_entered().await;

    // A question arriving mid-rebuild must wait for the swap rather than
    // read through the replaced dataset.
    let ask = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.ask("00445790", "Who were the auditors?").await })
    };
    gate.release();

    ingest
        .await
        .expect("ingest task")
        .expect("re-ingest succeeds");
    let answer = ask
        .await
        .expect("ask task")
        .expect("ask during rebuild never errors");
    assert!(answer.contains("Jones and Partners"));
    assert!(!answer.contains("Smith and Co"));
}

#[tokio::test]
async fn multi_page_filing_is_indexed_per_page() {
    let harness = PipelineHarness::new();
    harness.write_filing(
        "00445790",
        "accounts.pdf",
        &[
            "Page one covers the directors report.",
            "Page two covers the balance sheet.",
            "Page three covers the notes to the accounts.",
        ],
    );

    let engine = harness.engine();
    let report = engine.ingest("00445790").await.expect("ingest");
    assert_eq!(report.pages, 3);
    assert!(report.chunks >= 3);
}
