//! Managed Python subprocess used by the external Ragas scorer.
//!
//! Scripts receive a JSON document on stdin and write a JSON document to
//! stdout. No timeout is applied unless one is configured.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ExternalConfig;
use crate::error::ScoringError;

/// Information about the detected Python installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonInfo {
    pub path: PathBuf,
    pub version: String,
}

/// Managed Python subprocess runner.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python_path: PathBuf,
    venv_path: Option<PathBuf>,
    workdir: PathBuf,
    timeout: Option<Duration>,
}

impl PythonRuntime {
    pub fn from_config(config: &ExternalConfig, workdir: PathBuf) -> Self {
        Self {
            python_path: config
                .python_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("python3")),
            venv_path: config.venv_path.clone(),
            workdir,
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Get the effective Python command (accounting for venv).
    fn python_cmd(&self) -> PathBuf {
        if let Some(venv) = &self.venv_path {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.python_path.clone()
        }
    }

    /// Report the interpreter version, failing if it cannot be started.
    pub async fn detect(&self) -> Result<PythonInfo, ScoringError> {
        let output = Command::new(self.python_cmd())
            .arg("--version")
            .output()
            .await
            .map_err(|e| ScoringError::unavailable(format!("Python not found: {e}")))?;

        if !output.status.success() {
            return Err(ScoringError::unavailable(format!(
                "Python exited with {}",
                output.status
            )));
        }

        // Python 2 and early 3.x print the version to stderr
        let mut version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            version = String::from_utf8_lossy(&output.stderr).trim().to_string();
        }
        Ok(PythonInfo {
            path: self.python_cmd(),
            version,
        })
    }

    /// Run a Python script with JSON input/output.
    pub async fn run_script(
        &self,
        script: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, ScoringError> {
        let input_json = serde_json::to_vec(input)
            .map_err(|e| ScoringError::failed(format!("Failed to encode script input: {e}")))?;

        debug!(
            script_len = script.len(),
            input_bytes = input_json.len(),
            "Running Python script"
        );

        let run = async {
            let mut child = Command::new(self.python_cmd())
                .args(["-c", script])
                .current_dir(&self.workdir)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| ScoringError::unavailable(format!("Failed to spawn Python: {e}")))?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(&input_json)
                    .await
                    .map_err(|e| ScoringError::failed(format!("Failed to write stdin: {e}")))?;
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| ScoringError::failed(format!("Python process error: {e}")))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ScoringError::failed(format!(
                    "Python script failed (exit {}): {}",
                    output.status,
                    stderr.trim()
                )));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            serde_json::from_str::<serde_json::Value>(stdout.trim())
                .map_err(|e| ScoringError::malformed(format!("Invalid JSON output: {e}")))
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ScoringError::Timeout {
                    timeout_secs: limit.as_secs(),
                })?,
            None => run.await,
        }
    }

    /// Check which packages can be imported.
    pub async fn check_packages(&self, packages: &[&str]) -> HashMap<String, bool> {
        let mut results = HashMap::new();

        for pkg in packages {
            let script = format!("import importlib; importlib.import_module('{pkg}')");
            let available = Command::new(self.python_cmd())
                .args(["-c", &script])
                .current_dir(&self.workdir)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .is_ok_and(|s| s.success());

            results.insert(pkg.to_string(), available);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_cmd_prefers_venv() {
        let config = ExternalConfig {
            python_path: Some(PathBuf::from("/opt/python/bin/python3.11")),
            venv_path: Some(PathBuf::from("/work/.venv")),
            ..Default::default()
        };
        let runtime = PythonRuntime::from_config(&config, PathBuf::from("."));
        let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
        assert_eq!(
            runtime.python_cmd(),
            PathBuf::from("/work/.venv").join(bin_dir).join("python")
        );
    }

    #[test]
    fn test_from_config_timeout() {
        let config = ExternalConfig {
            timeout_secs: Some(90),
            ..Default::default()
        };
        let runtime = PythonRuntime::from_config(&config, PathBuf::from("."));
        assert_eq!(runtime.timeout, Some(Duration::from_secs(90)));
        assert_eq!(runtime.python_cmd(), PathBuf::from("python3"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_unavailable() {
        let config = ExternalConfig {
            python_path: Some(PathBuf::from("/nonexistent/raglens-python")),
            ..Default::default()
        };
        let runtime = PythonRuntime::from_config(&config, std::env::temp_dir());
        let err = runtime.detect().await.unwrap_err();
        assert!(matches!(err, ScoringError::Unavailable { .. }));

        let err = runtime
            .run_script("print('{}')", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Unavailable { .. }));

        let packages = runtime.check_packages(&["json"]).await;
        assert_eq!(packages.get("json"), Some(&false));
    }

    /// Runtime on the default interpreter, or `None` when no Python is installed.
    async fn local_runtime(timeout_secs: Option<u64>) -> Option<PythonRuntime> {
        let config = ExternalConfig {
            timeout_secs,
            ..Default::default()
        };
        let runtime = PythonRuntime::from_config(&config, std::env::temp_dir());
        match runtime.detect().await {
            Ok(_) => Some(runtime),
            Err(e) => {
                eprintln!("skipping: {e}");
                None
            }
        }
    }

    #[tokio::test]
    async fn test_run_script_echoes_stdin() {
        let Some(runtime) = local_runtime(None).await else {
            return;
        };
        let input = serde_json::json!({"dataset": {"question": ["q"]}, "metrics": ["faithfulness"]});
        let output = runtime
            .run_script(
                "import json, sys\nprint(json.dumps(json.load(sys.stdin)))",
                &input,
            )
            .await
            .unwrap();
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_run_script_nonzero_exit_is_failed() {
        let Some(runtime) = local_runtime(None).await else {
            return;
        };
        let err = runtime
            .run_script(
                "import sys\nsys.stderr.write('boom')\nsys.exit(3)",
                &serde_json::json!({}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Failed { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_run_script_non_json_is_malformed() {
        let Some(runtime) = local_runtime(None).await else {
            return;
        };
        let err = runtime
            .run_script("print('not json')", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_run_script_times_out() {
        let Some(runtime) = local_runtime(Some(1)).await else {
            return;
        };
        let started = std::time::Instant::now();
        let err = runtime
            .run_script("import time\ntime.sleep(10)", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Timeout { timeout_secs: 1 }));
        assert!(started.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_check_packages_reports_stdlib() {
        let Some(runtime) = local_runtime(None).await else {
            return;
        };
        let packages = runtime
            .check_packages(&["json", "raglens_no_such_module"])
            .await;
        assert_eq!(packages.get("json"), Some(&true));
        assert_eq!(packages.get("raglens_no_such_module"), Some(&false));
    }

    #[test]
    fn test_python_info_serde() {
        let info = PythonInfo {
            path: PathBuf::from("/usr/bin/python3"),
            version: "Python 3.11.0".to_string(),
        };
        let json = serde_json::to_string(&info).unwrap();
        let parsed: PythonInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, info.version);
    }
}
