//! Fallback composition of scorers.
//!
//! The primary scorer gets exactly one attempt per run. Any error from it
//! (unavailable, failed, malformed, timed out) is logged and the whole batch
//! is rescored by the heuristic scorer. There are no retries.

use tracing::{info, warn};

use super::heuristic::HeuristicScorer;
use super::{ScoreBatch, Scorer};
use crate::error::ScoringError;
use crate::record::EvaluationRecord;

pub struct FallbackScorer {
    primary: Option<Box<dyn Scorer>>,
    fallback: HeuristicScorer,
}

impl FallbackScorer {
    /// A scorer with no primary: every run is heuristic.
    pub fn heuristic_only(fallback: HeuristicScorer) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }

    pub fn new(primary: Box<dyn Scorer>, fallback: HeuristicScorer) -> Self {
        Self {
            primary: Some(primary),
            fallback,
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Score the batch, never failing.
    pub async fn score(&self, records: &[EvaluationRecord]) -> ScoreBatch {
        let Some(primary) = &self.primary else {
            info!("External scorer not configured, using heuristic evaluation");
            return self.fallback_batch(records);
        };
        if records.is_empty() {
            info!(scorer = primary.name(), "No records to score, skipping external scorer");
            return self.fallback_batch(records);
        }

        match primary.score_batch(records).await {
            Ok(batch) if batch.evaluations.len() == records.len() => batch,
            Ok(batch) => {
                warn!(
                    scorer = primary.name(),
                    expected = records.len(),
                    got = batch.evaluations.len(),
                    "Scorer returned the wrong number of evaluations, falling back to heuristic evaluation"
                );
                self.fallback_batch(records)
            }
            Err(ScoringError::Unavailable { reason }) => {
                warn!(scorer = primary.name(), %reason, "External scorer unavailable, using heuristic evaluation");
                self.fallback_batch(records)
            }
            Err(e) => {
                warn!(scorer = primary.name(), error = %e, "External evaluation failed, falling back to heuristic evaluation");
                self.fallback_batch(records)
            }
        }
    }

    fn fallback_batch(&self, records: &[EvaluationRecord]) -> ScoreBatch {
        ScoreBatch {
            evaluations: self.fallback.evaluate_all(records),
            external_metrics: None,
        }
    }
}
