//! Error types for the raglens evaluation core.
//!
//! `RagLensError` covers the fatal conditions of a run (missing or malformed
//! input, configuration, export I/O). `ScoringError` covers the external
//! scorer and is always recovered by the heuristic fallback.

use std::path::PathBuf;

/// Top-level error type for the raglens core library.
#[derive(Debug, thiserror::Error)]
pub enum RagLensError {
    #[error("Input file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Malformed input in {path}: {message}")]
    MalformedInput { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Export to {path} failed: {message}")]
    Export { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl RagLensError {
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors from the external scoring capability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("External scorer unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("External scorer failed: {message}")]
    Failed { message: String },

    #[error("External scorer returned an uninterpretable result: {message}")]
    Malformed { message: String },

    #[error("External scorer timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl ScoringError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

impl From<Box<figment::Error>> for ConfigError {
    fn from(err: Box<figment::Error>) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}

/// A convenience type alias for raglens results.
pub type Result<T> = std::result::Result<T, RagLensError>;
