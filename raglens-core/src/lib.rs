//! # RagLens Core
//!
//! Offline quality evaluation for retrieval-augmented generation runs.
//! Loads recorded interactions, scores them with an external Ragas backend
//! or the built-in lexical heuristics, aggregates the scores per user role,
//! and renders a console summary plus JSON and CSV exports.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod runtime;
pub mod scoring;

// Re-export commonly used types at the crate root.
pub use aggregate::{AggregateReport, RoleSummary, aggregate, aggregate_at};
pub use config::{ConfigOverrides, RagLensConfig, load_config};
pub use error::{ConfigError, RagLensError, Result, ScoringError};
pub use metrics::{MetricSet, MetricSummary, round_score};
pub use pipeline::{EvaluationPipeline, PipelineOutput};
pub use record::{EvaluationRecord, RecordMetadata, RecordStore};
pub use report::{ExportDocument, ExportMetadata, summarize};
pub use runtime::{PythonInfo, PythonRuntime};
pub use scoring::{
    Evaluation, EvaluationMetadata, ExternalScorer, FallbackScorer, HeuristicScorer,
    MetricsBackend, RagasBackend, ScoreBatch, Scorer, ScoringMode,
};
