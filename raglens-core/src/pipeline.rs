//! One evaluation run: score the store, aggregate, and hand the results to
//! the reporter.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::aggregate::{AggregateReport, aggregate};
use crate::config::{OutputConfig, RagLensConfig};
use crate::error::Result;
use crate::record::RecordStore;
use crate::report::{self, ExportDocument};
use crate::runtime::PythonRuntime;
use crate::scoring::{
    Evaluation, ExternalScorer, FallbackScorer, HeuristicScorer, RagasBackend, ScoringMode,
};

/// Scores a [`RecordStore`] and aggregates the result.
pub struct EvaluationPipeline {
    scorer: FallbackScorer,
}

impl EvaluationPipeline {
    pub fn new(scorer: FallbackScorer) -> Self {
        Self { scorer }
    }

    /// Build the scorer chain described by the configuration.
    ///
    /// With `external.enabled`, the Ragas backend runs in a Python subprocess
    /// rooted at `workdir` and the heuristic scorer backs it up.
    pub fn from_config(config: &RagLensConfig, workdir: PathBuf) -> Self {
        let heuristic = HeuristicScorer::from_config(&config.heuristic);
        if !config.external.enabled {
            return Self::new(FallbackScorer::heuristic_only(heuristic));
        }

        let runtime = PythonRuntime::from_config(&config.external, workdir);
        let external = ExternalScorer::new(
            Arc::new(RagasBackend::new(runtime)),
            config.external.metrics.clone(),
            heuristic.clone(),
        );
        Self::new(FallbackScorer::new(Box::new(external), heuristic))
    }

    pub async fn run(&self, store: &RecordStore) -> PipelineOutput {
        info!(records = store.len(), source = %store.source().display(), "Starting evaluation");

        let batch = self.scorer.score(store.records()).await;
        let mut report = aggregate(&batch.evaluations);
        if let Some(external) = &batch.external_metrics {
            report = report.with_external_metrics(external);
        }

        info!(
            evaluations = report.total_evaluations,
            mode = %report.scoring_mode,
            overall = report.overall_metrics.overall_score,
            "Evaluation complete"
        );
        PipelineOutput {
            evaluations: batch.evaluations,
            report,
            source: store.source().to_path_buf(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub evaluations: Vec<Evaluation>,
    pub report: AggregateReport,
    pub source: PathBuf,
}

impl PipelineOutput {
    pub fn mode(&self) -> ScoringMode {
        self.report.scoring_mode
    }

    pub fn summary(&self) -> String {
        report::summarize(&self.report)
    }

    pub fn export_document(&self) -> ExportDocument {
        report::to_json(&self.report, &self.evaluations, &self.source)
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        self.export_document().write(path).await
    }

    pub async fn write_csv(&self, path: &Path) -> Result<()> {
        report::write_csv(&self.evaluations, path).await
    }

    /// Write the exports enabled in `output`, returning the written paths.
    pub async fn write_exports(&self, output: &OutputConfig) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if output.write_json {
            self.write_json(&output.json_path).await?;
            written.push(output.json_path.clone());
        }
        if output.write_csv {
            self.write_csv(&output.csv_path).await?;
            written.push(output.csv_path.clone());
        }
        Ok(written)
    }
}
