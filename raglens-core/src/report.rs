//! Console summary and JSON/CSV exports of an evaluation run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::aggregate::AggregateReport;
use crate::error::{RagLensError, Result};
use crate::metrics::MetricSummary;
use crate::scoring::Evaluation;

/// Framework name recorded in export metadata.
pub const FRAMEWORK: &str = "Ragas";

/// Column header of the CSV export.
pub const CSV_HEADER: [&str; 10] = [
    "Query",
    "User Role",
    "Faithfulness",
    "Answer Relevancy",
    "Context Precision",
    "Context Recall",
    "Overall Score",
    "Processing Time (ms)",
    "Source Count",
    "Timestamp",
];

const RULE_WIDTH: usize = 70;

fn metric_lines(summary: &MetricSummary, indent: &str) -> String {
    let m = &summary.metrics;
    let mut out = String::new();
    out.push_str(&format!("{indent}Faithfulness:      {:.3}\n", m.faithfulness));
    out.push_str(&format!("{indent}Answer Relevancy:  {:.3}\n", m.answer_relevancy));
    out.push_str(&format!("{indent}Context Precision: {:.3}\n", m.context_precision));
    out.push_str(&format!("{indent}Context Recall:    {:.3}\n", m.context_recall));
    out.push_str(&format!("{indent}Overall Score:     {:.3}\n", summary.overall_score));
    out
}

/// Render the human-readable run summary.
///
/// Every number is printed with exactly three decimals. Roles appear in
/// lexical order, upper-cased.
pub fn summarize(report: &AggregateReport) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);

    let mut out = format!("{rule}\nRAG EVALUATION SUMMARY\n{rule}\n\n");
    out.push_str(&format!("Total Evaluations: {}\n", report.total_evaluations));
    out.push_str(&format!("Timestamp: {}\n", report.timestamp));
    out.push_str(&format!("Scoring Mode: {}\n\n", report.scoring_mode));

    out.push_str(&format!("OVERALL METRICS\n{thin}\n"));
    out.push_str(&metric_lines(&report.overall_metrics, "  "));

    if !report.external_metrics.is_empty() {
        out.push_str(&format!("\nEXTERNAL METRICS\n{thin}\n"));
        for (name, value) in &report.external_metrics {
            out.push_str(&format!("  {:<20}{value:.3}\n", format!("{name}:")));
        }
    }

    out.push_str(&format!("\nMETRICS BY ROLE\n{thin}\n"));
    for (role, summary) in &report.by_role {
        out.push_str(&format!("\n  {} (n={})\n", role.to_uppercase(), summary.count));
        out.push_str(&metric_lines(&summary.summary, "    "));
    }

    out.push_str(&format!("\n{rule}\n"));
    out
}

/// Provenance attached to a JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub framework: String,
    pub evaluation_date: String,
    pub source_file: String,
    pub total_results_evaluated: usize,
}

/// The structured JSON export of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub evaluations: Vec<Evaluation>,
    pub aggregate_metrics: AggregateReport,
    pub metadata: ExportMetadata,
}

impl ExportDocument {
    pub fn new(report: &AggregateReport, evaluations: &[Evaluation], source: &Path) -> Self {
        Self::new_at(report, evaluations, source, Utc::now())
    }

    pub fn new_at(
        report: &AggregateReport,
        evaluations: &[Evaluation],
        source: &Path,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            evaluations: evaluations.to_vec(),
            aggregate_metrics: report.clone(),
            metadata: ExportMetadata {
                framework: FRAMEWORK.to_string(),
                evaluation_date: exported_at.to_rfc3339(),
                source_file: source.display().to_string(),
                total_results_evaluated: evaluations.len(),
            },
        }
    }

    /// Pretty-printed JSON with two-space indentation.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_file(path, json.as_bytes()).await?;
        info!(path = %path.display(), evaluations = self.evaluations.len(), "JSON report written");
        Ok(())
    }
}

/// Build the JSON export document for a run.
pub fn to_json(
    report: &AggregateReport,
    evaluations: &[Evaluation],
    source: &Path,
) -> ExportDocument {
    ExportDocument::new(report, evaluations, source)
}

/// Strings are written bare, everything else as its JSON text.
fn metadata_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write the CSV export to any writer. The header is always written.
pub fn write_csv_to<W: std::io::Write>(evaluations: &[Evaluation], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for eval in evaluations {
        let m = &eval.metrics;
        wtr.write_record([
            eval.query.clone(),
            eval.metadata.user_role.clone(),
            format!("{:?}", m.faithfulness),
            format!("{:?}", m.answer_relevancy),
            format!("{:?}", m.context_precision),
            format!("{:?}", m.context_recall),
            format!("{:?}", eval.overall_score),
            metadata_cell(&eval.metadata.processing_time_ms),
            metadata_cell(&eval.metadata.source_count),
            eval.metadata.timestamp.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render the CSV export as a string.
pub fn to_csv(evaluations: &[Evaluation]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv_to(evaluations, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub async fn write_csv(evaluations: &[Evaluation], path: &Path) -> Result<()> {
    let csv = to_csv(evaluations)?;
    write_file(path, csv.as_bytes()).await?;
    info!(path = %path.display(), rows = evaluations.len(), "CSV report written");
    Ok(())
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let export_err = |e: std::io::Error| RagLensError::Export {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(export_err)?;
    }
    tokio::fs::write(path, contents).await.map_err(export_err)
}
