//! External aggregate scorer.
//!
//! A [`MetricsBackend`] is queried once per run with the whole dataset and
//! answers with aggregate metric values only. The [`ExternalScorer`] trusts
//! that aggregate as the run's top line and fills the per-record detail with
//! the heuristic scorer so role breakdowns remain available.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::heuristic::HeuristicScorer;
use super::{ScoreBatch, Scorer};
use crate::error::ScoringError;
use crate::metrics::round_score;
use crate::record::EvaluationRecord;
use crate::runtime::PythonRuntime;

/// Column-oriented dataset handed to the external scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringDataset {
    pub query: Vec<String>,
    pub generated_response: Vec<String>,
    pub retrieved_documents: Vec<Vec<String>>,
}

impl ScoringDataset {
    pub fn from_records(records: &[EvaluationRecord]) -> Self {
        let mut dataset = Self::default();
        for record in records {
            dataset.query.push(record.query.clone());
            dataset
                .generated_response
                .push(record.generated_response.clone());
            dataset
                .retrieved_documents
                .push(record.retrieved_documents.clone());
        }
        dataset
    }

    pub fn len(&self) -> usize {
        self.query.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }
}

/// A capability that computes aggregate quality metrics for a dataset.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Check that the backend can run at all, without scoring anything.
    async fn probe(&self) -> Result<(), ScoringError>;

    /// Score the whole dataset, returning a metric name → value mapping.
    async fn evaluate(
        &self,
        dataset: &ScoringDataset,
        metrics: &[String],
    ) -> Result<serde_json::Value, ScoringError>;
}

/// Keep the numeric entries of an external result, rounded.
///
/// Non-numeric entries are skipped. The result is rejected if it is not an
/// object, if a numeric entry is outside `[0, 1]`, or if nothing numeric is left.
pub fn interpret_result(value: &serde_json::Value) -> Result<BTreeMap<String, f64>, ScoringError> {
    let serde_json::Value::Object(entries) = value else {
        return Err(ScoringError::malformed(format!(
            "expected a metric mapping, got {}",
            json_kind(value)
        )));
    };

    let mut metrics = BTreeMap::new();
    for (name, raw) in entries {
        let Some(score) = raw.as_f64() else {
            debug!(metric = %name, "Skipping non-numeric external metric");
            continue;
        };
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ScoringError::malformed(format!(
                "metric '{name}' out of range: {score}"
            )));
        }
        metrics.insert(name.clone(), round_score(score));
    }

    if metrics.is_empty() {
        return Err(ScoringError::malformed("no numeric metrics in result"));
    }
    Ok(metrics)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Scorer that takes its aggregate from a [`MetricsBackend`].
pub struct ExternalScorer {
    backend: Arc<dyn MetricsBackend>,
    metrics: Vec<String>,
    heuristic: HeuristicScorer,
}

impl ExternalScorer {
    pub fn new(
        backend: Arc<dyn MetricsBackend>,
        metrics: Vec<String>,
        heuristic: HeuristicScorer,
    ) -> Self {
        Self {
            backend,
            metrics,
            heuristic,
        }
    }
}

#[async_trait]
impl Scorer for ExternalScorer {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn score_batch(&self, records: &[EvaluationRecord]) -> Result<ScoreBatch, ScoringError> {
        self.backend.probe().await?;

        let dataset = ScoringDataset::from_records(records);
        info!(
            backend = self.backend.name(),
            samples = dataset.len(),
            "Running external evaluation"
        );
        let raw = self.backend.evaluate(&dataset, &self.metrics).await?;
        let aggregate = interpret_result(&raw)?;
        info!(backend = self.backend.name(), metrics = ?aggregate, "External evaluation complete");

        Ok(ScoreBatch {
            evaluations: self.heuristic.evaluate_all(records),
            external_metrics: Some(aggregate),
        })
    }
}

/// Reads `{"dataset": {...}, "metrics": [...]}` on stdin and prints
/// `{"scores": {...}, "skipped": {...}}`. Each metric is evaluated on its
/// own so one that cannot run on this dataset does not sink the others.
const RAGAS_SCRIPT: &str = r#"
import json, math, sys
from datasets import Dataset
from ragas import evaluate
import ragas.metrics as rm

payload = json.load(sys.stdin)
data = payload["dataset"]
dataset = Dataset.from_dict({
    "question": data["query"],
    "answer": data["generated_response"],
    "contexts": data["retrieved_documents"],
})

def mean_scores(result):
    try:
        return dict(result).items()
    except Exception:
        return result.to_pandas().mean(numeric_only=True).to_dict().items()

scores, skipped = {}, {}
for name in payload["metrics"]:
    metric = getattr(rm, name, None)
    if metric is None:
        skipped[name] = "unknown metric"
        continue
    try:
        result = evaluate(dataset, metrics=[metric], raise_exceptions=True)
    except Exception as exc:
        skipped[name] = f"{type(exc).__name__}: {exc}"
        continue
    for key, value in mean_scores(result):
        if isinstance(value, (int, float)) and not isinstance(value, bool):
            scores[key] = None if math.isnan(value) else float(value)
print(json.dumps({"scores": scores, "skipped": skipped}))
"#;

/// Split the script output into its scores, logging every skipped metric.
fn unpack_ragas_output(output: serde_json::Value) -> Result<serde_json::Value, ScoringError> {
    let serde_json::Value::Object(mut fields) = output else {
        return Err(ScoringError::malformed(format!(
            "expected script output object, got {}",
            json_kind(&output)
        )));
    };
    if let Some(serde_json::Value::Object(skipped)) = fields.get("skipped") {
        for (metric, reason) in skipped {
            let reason = reason.as_str().unwrap_or("no reason given");
            warn!(%metric, %reason, "Ragas metric skipped");
        }
    }
    fields
        .remove("scores")
        .ok_or_else(|| ScoringError::malformed("script output has no `scores` field"))
}

const RAGAS_PACKAGES: [&str; 2] = ["ragas", "datasets"];

/// The Ragas library, run in a managed Python interpreter.
pub struct RagasBackend {
    runtime: PythonRuntime,
}

impl RagasBackend {
    pub fn new(runtime: PythonRuntime) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl MetricsBackend for RagasBackend {
    fn name(&self) -> &str {
        "ragas"
    }

    async fn probe(&self) -> Result<(), ScoringError> {
        let info = self.runtime.detect().await?;
        debug!(python = %info.path.display(), version = %info.version, "Python detected");

        let packages = self.runtime.check_packages(&RAGAS_PACKAGES).await;
        let mut missing: Vec<&str> = packages
            .iter()
            .filter(|(_, available)| !**available)
            .map(|(name, _)| name.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort_unstable();
            Err(ScoringError::unavailable(format!(
                "missing Python packages: {} (pip install ragas datasets)",
                missing.join(", ")
            )))
        }
    }

    async fn evaluate(
        &self,
        dataset: &ScoringDataset,
        metrics: &[String],
    ) -> Result<serde_json::Value, ScoringError> {
        let input = serde_json::json!({
            "dataset": dataset,
            "metrics": metrics,
        });
        let output = self.runtime.run_script(RAGAS_SCRIPT, &input).await?;
        unpack_ragas_output(output)
    }
}
