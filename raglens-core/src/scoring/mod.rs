//! Scorers turn evaluation records into per-record [`Evaluation`]s.
//!
//! Every scorer implements [`Scorer`]. The [`HeuristicScorer`] is total and
//! local; the [`ExternalScorer`] delegates the aggregate to an external
//! metrics backend; the [`FallbackScorer`] composes the two and owns the
//! policy for recovering from external failures.

pub mod external;
pub mod fallback;
pub mod heuristic;

pub use external::{ExternalScorer, MetricsBackend, RagasBackend, ScoringDataset};
pub use fallback::FallbackScorer;
pub use heuristic::HeuristicScorer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ScoringError;
use crate::metrics::MetricSet;
use crate::record::EvaluationRecord;

/// Role label used when a record carries no `userRole`.
pub const UNKNOWN_ROLE: &str = "unknown";

/// Metadata carried from the record into its evaluation.
///
/// The numeric fields keep whatever JSON value the record held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    pub user_role: String,
    pub processing_time_ms: serde_json::Value,
    pub source_count: serde_json::Value,
    pub session_id: String,
    pub timestamp: String,
}

/// The scored form of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub query: String,
    pub metrics: MetricSet,
    pub metadata: EvaluationMetadata,
    pub overall_score: f64,
}

impl Evaluation {
    pub fn from_record(record: &EvaluationRecord, metrics: MetricSet) -> Self {
        let meta = &record.metadata;
        let user_role = meta
            .user_role
            .as_deref()
            .filter(|role| !role.trim().is_empty())
            .unwrap_or(UNKNOWN_ROLE)
            .to_string();

        Self {
            query: record.query.clone(),
            metrics,
            metadata: EvaluationMetadata {
                user_role,
                processing_time_ms: meta.processing_time_ms.clone(),
                source_count: meta.source_count.clone(),
                session_id: meta.session_id.clone(),
                timestamp: meta.timestamp.clone(),
            },
            overall_score: metrics.overall_score(),
        }
    }

    pub fn role(&self) -> &str {
        &self.metadata.user_role
    }
}

/// Which scoring path produced a run's top-line numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Every number comes from the heuristic scorer.
    #[default]
    Heuristic,
    /// The external aggregate is the top line; role breakdowns are heuristic.
    Hybrid,
}

impl std::fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heuristic => write!(f, "heuristic"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Result of scoring a whole batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBatch {
    /// One evaluation per input record, in input order.
    pub evaluations: Vec<Evaluation>,
    /// Aggregate metric values reported by an external scorer, rounded.
    pub external_metrics: Option<BTreeMap<String, f64>>,
}

impl ScoreBatch {
    pub fn mode(&self) -> ScoringMode {
        if self.external_metrics.is_some() {
            ScoringMode::Hybrid
        } else {
            ScoringMode::Heuristic
        }
    }
}

/// A strategy for scoring a batch of records.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Score every record of the batch in one call.
    async fn score_batch(&self, records: &[EvaluationRecord]) -> Result<ScoreBatch, ScoringError>;
}
