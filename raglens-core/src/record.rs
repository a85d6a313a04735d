//! Evaluation records and the store that loads them.
//!
//! Input is a JSON document whose `results` array holds one object per RAG
//! interaction. Every field of a record is optional; absent or `null` fields
//! take their default value.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{RagLensError, Result};

/// Deserialize a field that may be absent or `null` into its default.
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A numeric metadata value kept exactly as the source wrote it.
///
/// Absent or `null` becomes `0`. Any other JSON value is passed through
/// untouched, so `812` stays an integer and `"1250"` stays a string.
fn null_zero<'de, D>(deserializer: D) -> std::result::Result<serde_json::Value, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(if value.is_null() { zero() } else { value })
}

fn zero() -> serde_json::Value {
    serde_json::Value::from(0)
}

/// Interaction metadata as recorded by the RAG service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(default, deserialize_with = "null_default")]
    pub user_role: Option<String>,
    #[serde(default = "zero", deserialize_with = "null_zero")]
    pub processing_time_ms: serde_json::Value,
    #[serde(default = "zero", deserialize_with = "null_zero")]
    pub source_count: serde_json::Value,
    #[serde(default, deserialize_with = "null_default")]
    pub session_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub timestamp: String,
}

impl Default for RecordMetadata {
    fn default() -> Self {
        Self {
            user_role: None,
            processing_time_ms: zero(),
            source_count: zero(),
            session_id: String::new(),
            timestamp: String::new(),
        }
    }
}

/// One RAG interaction: the query, the generated answer, and the documents
/// retrieved to support it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(default, deserialize_with = "null_default")]
    pub query: String,
    #[serde(default, deserialize_with = "null_default")]
    pub generated_response: String,
    #[serde(default, deserialize_with = "null_default")]
    pub retrieved_documents: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub metadata: RecordMetadata,
}

impl EvaluationRecord {
    pub fn new(
        query: impl Into<String>,
        generated_response: impl Into<String>,
        retrieved_documents: Vec<String>,
    ) -> Self {
        Self {
            query: query.into(),
            generated_response: generated_response.into(),
            retrieved_documents,
            metadata: RecordMetadata::default(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.metadata.user_role = Some(role.into());
        self
    }

    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// An ordered, immutable batch of records together with the identifier of
/// the source it came from.
#[derive(Debug, Clone)]
pub struct RecordStore {
    source: PathBuf,
    records: Vec<EvaluationRecord>,
}

impl RecordStore {
    /// Wrap records that did not come from a file (tests, embedding callers).
    pub fn from_records(source: impl Into<PathBuf>, records: Vec<EvaluationRecord>) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }

    /// Load every record from a results file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_limit(path, None).await
    }

    /// Load records from a results file, keeping at most `limit` of them.
    pub async fn load_with_limit(path: impl AsRef<Path>, limit: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagLensError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = parse_results(path, &content)?;
        if let Some(max) = limit {
            records.truncate(max);
        }

        info!(count = records.len(), source = %path.display(), "Loaded evaluation records");
        Ok(Self {
            source: path.to_path_buf(),
            records,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse the `results` array of a results document.
pub fn parse_results(path: &Path, content: &str) -> Result<Vec<EvaluationRecord>> {
    let document: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| RagLensError::malformed(path, format!("invalid JSON: {e}")))?;

    let serde_json::Value::Object(mut root) = document else {
        return Err(RagLensError::malformed(
            path,
            "top-level value must be an object",
        ));
    };

    let items = match root.remove("results") {
        None | Some(serde_json::Value::Null) => {
            debug!(source = %path.display(), "No `results` field, treating as empty");
            return Ok(Vec::new());
        }
        Some(serde_json::Value::Array(items)) => items,
        Some(_) => {
            return Err(RagLensError::malformed(path, "`results` must be an array"));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            if !item.is_object() {
                return Err(RagLensError::malformed(
                    path,
                    format!("results[{idx}] is not an object"),
                ));
            }
            serde_json::from_value(item)
                .map_err(|e| RagLensError::malformed(path, format!("results[{idx}]: {e}")))
        })
        .collect()
}
