//! Lexical heuristic scorer.
//!
//! Approximates the four quality metrics with token overlap and simple
//! length/count ratios. It never fails and never leaves the process, so it
//! backs every run where the external scorer is missing or broken.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

use super::{Evaluation, ScoreBatch, Scorer};
use crate::config::HeuristicConfig;
use crate::error::ScoringError;
use crate::metrics::{MetricSet, mean};
use crate::record::EvaluationRecord;

/// Distinct lowercased whitespace-delimited tokens.
fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Share of `subject` tokens that also occur in `reference`.
fn overlap_ratio(subject: &HashSet<String>, reference: &HashSet<String>) -> f64 {
    if subject.is_empty() {
        return 0.0;
    }
    let shared = subject.intersection(reference).count();
    (shared as f64 / subject.len() as f64).min(1.0)
}

fn normalized(value: f64, norm: f64) -> f64 {
    if norm <= 0.0 {
        0.0
    } else {
        (value / norm).min(1.0)
    }
}

/// Fraction of response tokens supported by the retrieved context.
pub fn faithfulness(response: &str, context: &[String]) -> f64 {
    if response.is_empty() || context.is_empty() {
        return 0.0;
    }
    let context_tokens = token_set(&context.join(" "));
    overlap_ratio(&token_set(response), &context_tokens)
}

/// Fraction of query tokens echoed by the response.
pub fn answer_relevancy(query: &str, response: &str) -> f64 {
    if query.is_empty() || response.is_empty() {
        return 0.0;
    }
    overlap_ratio(&token_set(query), &token_set(response))
}

/// Mean document length in characters relative to `norm_chars`.
pub fn context_precision(context: &[String], norm_chars: f64) -> f64 {
    let lengths: Vec<f64> = context.iter().map(|d| d.chars().count() as f64).collect();
    match mean(&lengths) {
        Some(avg) => normalized(avg, norm_chars),
        None => 0.0,
    }
}

/// Number of retrieved documents relative to `norm_docs`.
pub fn context_recall(context: &[String], norm_docs: f64) -> f64 {
    if context.is_empty() {
        return 0.0;
    }
    normalized(context.len() as f64, norm_docs)
}

/// Pure per-record scorer built from the functions above.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicScorer {
    precision_norm_chars: f64,
    recall_norm_docs: f64,
    progress_interval: usize,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::from_config(&HeuristicConfig::default())
    }
}

impl HeuristicScorer {
    pub fn from_config(config: &HeuristicConfig) -> Self {
        Self {
            precision_norm_chars: config.precision_norm_chars,
            recall_norm_docs: config.recall_norm_docs,
            progress_interval: config.progress_interval,
        }
    }

    pub fn score(&self, record: &EvaluationRecord) -> MetricSet {
        let context = &record.retrieved_documents;
        MetricSet::new(
            faithfulness(&record.generated_response, context),
            answer_relevancy(&record.query, &record.generated_response),
            context_precision(context, self.precision_norm_chars),
            context_recall(context, self.recall_norm_docs),
        )
    }

    pub fn evaluate(&self, record: &EvaluationRecord) -> Evaluation {
        Evaluation::from_record(record, self.score(record))
    }

    /// Score every record in order, logging progress periodically.
    pub fn evaluate_all(&self, records: &[EvaluationRecord]) -> Vec<Evaluation> {
        let total = records.len();
        let evaluations: Vec<Evaluation> = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let done = i + 1;
                if self.progress_interval > 0 && done % self.progress_interval == 0 {
                    info!("Evaluated {done}/{total} results");
                }
                self.evaluate(record)
            })
            .collect();
        info!(count = evaluations.len(), "Heuristic evaluation complete");
        evaluations
    }
}

#[async_trait]
impl Scorer for HeuristicScorer {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn score_batch(&self, records: &[EvaluationRecord]) -> Result<ScoreBatch, ScoringError> {
        Ok(ScoreBatch {
            evaluations: self.evaluate_all(records),
            external_metrics: None,
        })
    }
}
