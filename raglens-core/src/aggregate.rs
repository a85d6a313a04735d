//! Reduction of per-record evaluations into run-level and per-role statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metrics::{CORE_METRICS, MetricSet, MetricSummary, mean, round_score};
use crate::scoring::{Evaluation, ScoringMode};

/// Statistics for one user role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub count: usize,
    #[serde(flatten)]
    pub summary: MetricSummary,
}

/// Aggregate statistics for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub total_evaluations: usize,
    pub timestamp: String,
    #[serde(default)]
    pub scoring_mode: ScoringMode,
    pub overall_metrics: MetricSummary,
    pub by_role: BTreeMap<String, RoleSummary>,
    /// Aggregate values reported by the external scorer, when it ran.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_metrics: BTreeMap<String, f64>,
}

impl AggregateReport {
    pub fn is_empty(&self) -> bool {
        self.total_evaluations == 0
    }

    /// Make the external aggregate the run's top line.
    ///
    /// Core metric names override the heuristic overall means, and the
    /// overall score becomes the mean of the resulting four values. Role
    /// breakdowns are left untouched.
    pub fn with_external_metrics(mut self, external: &BTreeMap<String, f64>) -> Self {
        let mut overridden = false;
        for name in CORE_METRICS {
            if let Some(&value) = external.get(name) {
                overridden |= self.overall_metrics.metrics.set(name, value);
            }
        }
        if overridden {
            self.overall_metrics.overall_score = self.overall_metrics.metrics.overall_score();
        }
        self.scoring_mode = ScoringMode::Hybrid;
        self.external_metrics = external.clone();
        self
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    faithfulness: Vec<f64>,
    answer_relevancy: Vec<f64>,
    context_precision: Vec<f64>,
    context_recall: Vec<f64>,
    overall: Vec<f64>,
}

impl Accumulator {
    fn push(&mut self, evaluation: &Evaluation) {
        let m = &evaluation.metrics;
        self.faithfulness.push(m.faithfulness);
        self.answer_relevancy.push(m.answer_relevancy);
        self.context_precision.push(m.context_precision);
        self.context_recall.push(m.context_recall);
        self.overall.push(evaluation.overall_score);
    }

    fn count(&self) -> usize {
        self.overall.len()
    }

    fn summary(&self) -> MetricSummary {
        let avg = |values: &[f64]| round_score(mean(values).unwrap_or(0.0));
        MetricSummary {
            metrics: MetricSet {
                faithfulness: avg(&self.faithfulness),
                answer_relevancy: avg(&self.answer_relevancy),
                context_precision: avg(&self.context_precision),
                context_recall: avg(&self.context_recall),
            },
            overall_score: avg(&self.overall),
        }
    }
}

/// Aggregate evaluations, stamping the report with the current time.
pub fn aggregate(evaluations: &[Evaluation]) -> AggregateReport {
    aggregate_at(evaluations, Utc::now())
}

/// Aggregate evaluations with an explicit generation time.
///
/// Empty input yields a zero-valued report with no role groups.
pub fn aggregate_at(evaluations: &[Evaluation], generated_at: DateTime<Utc>) -> AggregateReport {
    let mut global = Accumulator::default();
    let mut roles: BTreeMap<String, Accumulator> = BTreeMap::new();

    for evaluation in evaluations {
        global.push(evaluation);
        roles
            .entry(evaluation.role().to_string())
            .or_default()
            .push(evaluation);
    }

    let by_role = roles
        .into_iter()
        .map(|(role, acc)| {
            let summary = RoleSummary {
                count: acc.count(),
                summary: acc.summary(),
            };
            (role, summary)
        })
        .collect();

    AggregateReport {
        total_evaluations: global.count(),
        timestamp: generated_at.to_rfc3339(),
        scoring_mode: ScoringMode::Heuristic,
        overall_metrics: global.summary(),
        by_role,
        external_metrics: BTreeMap::new(),
    }
}
