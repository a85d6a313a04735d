//! End-to-end tests for the evaluation pipeline.
//!
//! Each test writes a results file to a temp directory, runs load → score →
//! aggregate → export, and checks what lands on disk.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use raglens_core::config::OutputConfig;
use raglens_core::scoring::ScoringDataset;
use raglens_core::{
    EvaluationPipeline, ExportDocument, ExternalScorer, FallbackScorer, HeuristicScorer,
    MetricsBackend, RagLensError, RecordStore, ScoringError, ScoringMode,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const RESULTS: &str = r#"{
  "summary": {"total": 3},
  "results": [
    {
      "query": "What is X?",
      "generated_response": "X is a thing",
      "retrieved_documents": ["X is a thing used for Y"],
      "metadata": {"userRole": "admin", "processingTimeMs": 812, "sourceCount": 1,
                   "sessionId": "s-1", "timestamp": "2025-02-01T09:00:00Z"}
    },
    {
      "query": "How do I reset my password?",
      "generated_response": "Open settings and choose reset password.",
      "retrieved_documents": ["To reset your password open settings.", "Passwords expire yearly."],
      "metadata": {"userRole": "user", "processingTimeMs": 1040.5, "sourceCount": 2}
    },
    {
      "query": "",
      "generated_response": "",
      "retrieved_documents": []
    }
  ]
}"#;

/// A backend that answers every call with the same outcome.
struct CannedBackend {
    probe: Result<(), ScoringError>,
    response: Result<serde_json::Value, ScoringError>,
    calls: AtomicUsize,
}

impl CannedBackend {
    fn new(
        probe: Result<(), ScoringError>,
        response: Result<serde_json::Value, ScoringError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            probe,
            response,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MetricsBackend for CannedBackend {
    fn name(&self) -> &str {
        "canned"
    }

    async fn probe(&self) -> Result<(), ScoringError> {
        self.probe.clone()
    }

    async fn evaluate(
        &self,
        _dataset: &ScoringDataset,
        _metrics: &[String],
    ) -> Result<serde_json::Value, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

fn write_results(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("rag-test-results.json");
    std::fs::write(&path, RESULTS).unwrap();
    path
}

fn heuristic_pipeline() -> EvaluationPipeline {
    EvaluationPipeline::new(FallbackScorer::heuristic_only(HeuristicScorer::default()))
}

fn external_pipeline(backend: Arc<CannedBackend>) -> EvaluationPipeline {
    let external = ExternalScorer::new(
        backend,
        vec!["faithfulness".into(), "answer_correctness".into()],
        HeuristicScorer::default(),
    );
    EvaluationPipeline::new(FallbackScorer::new(
        Box::new(external),
        HeuristicScorer::default(),
    ))
}

#[tokio::test]
async fn test_heuristic_run_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::load(write_results(dir.path())).await.unwrap();
    let output = heuristic_pipeline().run(&store).await;

    assert_eq!(output.mode(), ScoringMode::Heuristic);
    assert_eq!(output.report.total_evaluations, 3);
    assert_eq!(output.report.by_role.len(), 3);
    assert_eq!(output.report.by_role["unknown"].count, 1);

    let first = &output.evaluations[0];
    assert_eq!(first.metrics.answer_relevancy, 0.333);
    assert_eq!(first.metrics.faithfulness, 1.0);
    assert_eq!(first.metadata.processing_time_ms, serde_json::json!(812));
    assert_eq!(output.evaluations[1].metadata.processing_time_ms, serde_json::json!(1040.5));

    let blank = &output.evaluations[2];
    assert_eq!(blank.overall_score, 0.0);

    let summary = output.summary();
    assert!(summary.contains("Total Evaluations: 3"));
    assert!(summary.contains("UNKNOWN (n=1)"));
}

#[tokio::test]
async fn test_exports_reload() {
    let dir = TempDir::new().unwrap();
    let input = write_results(dir.path());
    let store = RecordStore::load(&input).await.unwrap();
    let output = heuristic_pipeline().run(&store).await;

    let config = OutputConfig {
        json_path: dir.path().join("reports").join("eval.json"),
        csv_path: dir.path().join("reports").join("eval.csv"),
        write_json: true,
        write_csv: true,
    };
    let written = output.write_exports(&config).await.unwrap();
    assert_eq!(written.len(), 2);

    let json = std::fs::read_to_string(&config.json_path).unwrap();
    let reloaded: ExportDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(
        reloaded.aggregate_metrics.total_evaluations,
        output.report.total_evaluations
    );
    assert_eq!(
        reloaded.aggregate_metrics.overall_metrics,
        output.report.overall_metrics
    );
    assert_eq!(reloaded.metadata.source_file, input.display().to_string());
    assert_eq!(reloaded.metadata.total_results_evaluated, 3);
    assert!(json.contains("\"processing_time_ms\": 812,"));
    assert!(json.contains("\"processing_time_ms\": 1040.5,"));

    let csv = std::fs::read_to_string(&config.csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Query,User Role,Faithfulness"));
    assert!(lines[1].starts_with("What is X?,admin,1.0,0.333,"));
    assert!(lines[1].ends_with(",812,1,2025-02-01T09:00:00Z"));
}

#[tokio::test]
async fn test_failing_external_matches_heuristic_run() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::load(write_results(dir.path())).await.unwrap();
    let baseline = heuristic_pipeline().run(&store).await;

    let failures = [
        CannedBackend::new(Err(ScoringError::unavailable("ragas not installed")), Ok(serde_json::json!({}))),
        CannedBackend::new(Ok(()), Err(ScoringError::failed("evaluate raised"))),
        CannedBackend::new(Ok(()), Err(ScoringError::Timeout { timeout_secs: 1 })),
        CannedBackend::new(Ok(()), Ok(serde_json::json!(["not", "a", "mapping"]))),
        CannedBackend::new(Ok(()), Ok(serde_json::json!({"faithfulness": 7.5}))),
    ];

    for backend in failures {
        let output = external_pipeline(backend.clone()).run(&store).await;
        assert!(backend.calls.load(Ordering::SeqCst) <= 1);
        assert_eq!(output.evaluations, baseline.evaluations);
        assert_eq!(output.report.overall_metrics, baseline.report.overall_metrics);
        assert_eq!(output.report.by_role, baseline.report.by_role);
        assert_eq!(output.mode(), ScoringMode::Heuristic);
        assert!(output.report.external_metrics.is_empty());
    }
}

#[tokio::test]
async fn test_external_success_is_hybrid() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::load(write_results(dir.path())).await.unwrap();
    let baseline = heuristic_pipeline().run(&store).await;

    let backend = CannedBackend::new(
        Ok(()),
        Ok(serde_json::json!({"faithfulness": 0.91234, "answer_correctness": 0.4})),
    );
    let output = external_pipeline(backend.clone()).run(&store).await;

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(output.mode(), ScoringMode::Hybrid);
    assert_eq!(output.report.overall_metrics.metrics.faithfulness, 0.912);
    assert_eq!(output.report.external_metrics["answer_correctness"], 0.4);
    assert_eq!(output.report.by_role, baseline.report.by_role);
    assert_eq!(output.evaluations, baseline.evaluations);
    assert!(output.summary().contains("EXTERNAL METRICS"));
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = RecordStore::load(dir.path().join("nope.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, RagLensError::NotFound { .. }));
    assert!(err.to_string().contains("nope.json"));
}

#[tokio::test]
async fn test_empty_results_produce_empty_exports() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("empty.json");
    std::fs::write(&input, r#"{"results": []}"#).unwrap();

    let store = RecordStore::load(&input).await.unwrap();
    let output = heuristic_pipeline().run(&store).await;
    assert_eq!(output.report.total_evaluations, 0);
    assert!(output.report.by_role.is_empty());

    let csv_path = dir.path().join("empty.csv");
    output.write_csv(&csv_path).await.unwrap();
    assert_eq!(std::fs::read_to_string(&csv_path).unwrap().lines().count(), 1);
}
