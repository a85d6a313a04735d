//! Configuration system for raglens.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/raglens/config.toml` and/or `.raglens/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration for an evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagLensConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub heuristic: HeuristicConfig,
    #[serde(default)]
    pub external: ExternalConfig,
}

/// Where evaluation records are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Results file with a top-level `results` array.
    #[serde(default = "default_input_path")]
    pub path: PathBuf,
    /// Evaluate at most this many records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
            limit: None,
        }
    }
}

fn default_input_path() -> PathBuf {
    PathBuf::from("rag-test-results.json")
}

/// Report export destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default = "default_true")]
    pub write_json: bool,
    #[serde(default = "default_true")]
    pub write_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_path: default_json_path(),
            csv_path: default_csv_path(),
            write_json: true,
            write_csv: true,
        }
    }
}

fn default_json_path() -> PathBuf {
    PathBuf::from("ragas-evaluation-results.json")
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("ragas-evaluation-results.csv")
}

/// Tuning for the lexical heuristic scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicConfig {
    /// Mean document length (in characters) that scores full context precision.
    #[serde(default = "default_precision_norm")]
    pub precision_norm_chars: f64,
    /// Document count that scores full context recall.
    #[serde(default = "default_recall_norm")]
    pub recall_norm_docs: f64,
    /// Log progress every N scored records (0 disables).
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            precision_norm_chars: default_precision_norm(),
            recall_norm_docs: default_recall_norm(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_precision_norm() -> f64 {
    500.0
}

fn default_recall_norm() -> f64 {
    10.0
}

fn default_progress_interval() -> usize {
    10
}

/// The external Ragas scorer, run through a managed Python interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalConfig {
    /// Try the external scorer before falling back to heuristics.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Python executable (defaults to `python3`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_path: Option<PathBuf>,
    /// Virtual environment containing `ragas` and `datasets`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venv_path: Option<PathBuf>,
    /// Abort the external call after this many seconds. No limit when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Metric names requested from the external scorer.
    #[serde(default = "default_external_metrics")]
    pub metrics: Vec<String>,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            python_path: None,
            venv_path: None,
            timeout_secs: None,
            metrics: default_external_metrics(),
        }
    }
}

fn default_external_metrics() -> Vec<String> {
    ["faithfulness", "answer_relevancy"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

/// Command-line values layered over every other source.
///
/// Only the fields that are `Some` reach the merged configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigOverrides {
    pub input: InputOverrides,
    pub output: OutputOverrides,
    pub external: ExternalOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExternalOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl RagLensConfig {
    /// Anchor relative file paths at `base`, normally the workspace.
    ///
    /// A bare interpreter name such as `python3` is left for `PATH` lookup.
    pub fn resolve_paths(&mut self, base: &Path) {
        resolve(base, &mut self.input.path);
        resolve(base, &mut self.output.json_path);
        resolve(base, &mut self.output.csv_path);
        if let Some(venv) = self.external.venv_path.as_mut() {
            resolve(base, venv);
        }
        if let Some(python) = self.external.python_path.as_mut() {
            if python.components().count() > 1 {
                resolve(base, python);
            }
        }
    }

    /// Check for settings that load but cannot produce a meaningful run.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.heuristic.precision_norm_chars <= 0.0 {
            warnings.push(format!(
                "heuristic.precision_norm_chars ({}) must be positive; context precision will be 0",
                self.heuristic.precision_norm_chars
            ));
        }
        if self.heuristic.recall_norm_docs <= 0.0 {
            warnings.push(format!(
                "heuristic.recall_norm_docs ({}) must be positive; context recall will be 0",
                self.heuristic.recall_norm_docs
            ));
        }
        if self.external.enabled && self.external.metrics.is_empty() {
            warnings.push("external.metrics is empty; the external scorer has nothing to compute".into());
        }
        if self.external.timeout_secs == Some(0) {
            warnings.push("external.timeout_secs is 0; every external call will time out".into());
        }
        warnings
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "raglens", "raglens")
}

/// Workspace-local config file location.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".raglens").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `RAGLENS_`)
/// 3. Workspace-local config (`.raglens/config.toml`)
/// 4. User config (`~/.config/raglens/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<RagLensConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(RagLensConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RAGLENS_EXTERNAL__ENABLED, RAGLENS_OUTPUT__CSV_PATH, etc.
    figment = figment.merge(Env::prefixed("RAGLENS_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment
        .extract()
        .map_err(|e| ConfigError::from(Box::new(e)))
}

/// Check whether any raglens configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs() {
        if dirs.config_dir().join("config.toml").exists() {
            return true;
        }
    }

    if let Some(ws) = workspace {
        if workspace_config_path(ws).exists() {
            return true;
        }
    }

    false
}

/// Render the built-in defaults as a TOML document.
pub fn default_config_toml() -> Result<String, ConfigError> {
    toml::to_string_pretty(&RagLensConfig::default()).map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
