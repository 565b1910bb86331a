//! Append-only audit log of copy and split operations.
//!
//! One JSON object per line. Records carry key names and already-redacted
//! display values only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use promoter_secrets::BackendKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::copy::CopyOutcome;
use crate::endpoint::Endpoint;
use crate::error::EngineError;
use crate::split::SplitOutcome;

/// Errors writing the operation log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to write operation log {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode operation record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Copy,
    Split,
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
    pub source_env: String,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_engine: Option<String>,
    pub source_store: BackendKind,
    pub target_env: String,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_engine: Option<String>,
    pub target_store: BackendKind,
    pub success: bool,
    pub message: String,
    /// Copied keys and their displayed values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeMap<String, String>>,
    /// Keys moved by a split.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_keys: Option<Vec<String>>,
}

impl OperationRecord {
    fn base(
        operation: OperationKind,
        source: &Endpoint,
        target: &Endpoint,
        success: bool,
        message: String,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            source_env: source.location.environment.clone(),
            source_path: source.location.path.clone(),
            source_engine: source.location.engine.clone(),
            source_store: source.store.kind(),
            target_env: target.location.environment.clone(),
            target_path: target.location.path.clone(),
            target_engine: target.location.engine.clone(),
            target_store: target.store.kind(),
            success,
            message,
            keys: None,
            split_keys: None,
        }
    }

    #[must_use]
    pub fn copied(source: &Endpoint, target: &Endpoint, outcome: &CopyOutcome) -> Self {
        Self {
            keys: Some(outcome.keys.clone()),
            ..Self::base(
                OperationKind::Copy,
                source,
                target,
                outcome.success,
                outcome.message.clone(),
            )
        }
    }

    #[must_use]
    pub fn failed_copy(source: &Endpoint, target: &Endpoint, error: &EngineError) -> Self {
        Self::base(OperationKind::Copy, source, target, false, error.to_string())
    }

    #[must_use]
    pub fn split(source: &Endpoint, target: &Endpoint, outcome: &SplitOutcome) -> Self {
        Self {
            split_keys: Some(outcome.moved_keys.clone()),
            ..Self::base(
                OperationKind::Split,
                source,
                target,
                true,
                format!(
                    "moved {} key(s) from {} to {}",
                    outcome.moved_keys.len(),
                    outcome.source_location,
                    outcome.target_location
                ),
            )
        }
    }

    /// A failed split. A partial failure still lists the keys that reached
    /// the target.
    #[must_use]
    pub fn failed_split(source: &Endpoint, target: &Endpoint, error: &EngineError) -> Self {
        let split_keys = match error {
            EngineError::PartialFailure { moved_keys, .. } => Some(moved_keys.clone()),
            _ => None,
        };
        Self {
            split_keys,
            ..Self::base(OperationKind::Split, source, target, false, error.to_string())
        }
    }
}

/// A log file that records are appended to.
#[derive(Debug, Clone)]
pub struct OperationLog {
    path: PathBuf,
}

impl OperationLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` as one line, creating the file if needed.
    pub async fn append(&self, record: &OperationRecord) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let io = |source: std::io::Error| LogError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io)?;
        file.write_all(&line).await.map_err(io)?;
        file.flush().await.map_err(io)?;

        debug!(log.path = %self.path.display(), "Operation recorded");
        Ok(())
    }
}
