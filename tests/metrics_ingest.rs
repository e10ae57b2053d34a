// tests/metrics_ingest.rs
#![cfg(feature = "strict-metrics")]
use forum_trends::config::EngineConfig;
use forum_trends::metrics::TrendMetrics;
use forum_trends::store::MemoryStore;
use forum_trends::TrendEngine;
use serde_json::json;

#[tokio::test]
async fn metrics_exposed_after_ingest_and_analysis() {
    // Install the process-wide recorder for this test binary
    let metrics = TrendMetrics::init().expect("recorder");

    let mem = MemoryStore::new();
    let engine = TrendEngine::new(EngineConfig::default(), mem.store());

    let raws = vec![
        json!({"question_id": 1, "title": "Borrow checker fails", "tags": ["rust"],
               "author": "ana", "pub_date": "2025-02-01T08:00:00Z"}),
        json!({"question_id": 2, "title": "", "tags": ["rust"], "pub_date": "2025-02-01"}),
    ];
    let report = engine.run_batch(&raws).await.unwrap();
    assert_eq!(report.storage.questions_written, 1);
    assert_eq!(report.storage.rejected, 1);

    // Scrape metrics text and check series presence by substring
    let out = metrics.render();
    for needle in [
        "ingest_questions_written_total",
        "ingest_duplicates_skipped_total",
        "ingest_rejected_total",
        "ingest_authors_new_total",
        "ingest_batch_ms",
        "ingest_last_run_ts",
        "analysis_runs_total",
        "analysis_ms",
    ] {
        assert!(out.contains(needle), "missing series {needle}");
    }
}
