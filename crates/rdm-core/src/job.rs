//! Transfer job record, identifiers and lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::config::JobConfig;
use crate::error::TransferError;
use crate::storage;
use crate::url_model;

/// Opaque job identifier, unique within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of one job execution.
///
/// `pending -> downloading -> {paused, retrying, completed, failed, cancelled}`;
/// `paused -> downloading | cancelled`; `retrying -> downloading | failed | cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Downloading,
    Paused,
    Retrying { attempt: u32, max: u32 },
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Human-readable label, e.g. `retrying (2/5)`.
    pub fn label(&self) -> String {
        match self {
            JobState::Pending => "pending".to_string(),
            JobState::Downloading => "downloading".to_string(),
            JobState::Paused => "paused".to_string(),
            JobState::Retrying { attempt, max } => format!("retrying ({}/{})", attempt, max),
            JobState::Completed => "completed".to_string(),
            JobState::Failed => "failed".to_string(),
            JobState::Cancelled => "cancelled".to_string(),
        }
    }

    /// Completed, failed and cancelled end an execution.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One requested download. Immutable once admitted; mutable progress lives
/// in the job's [`crate::control::JobControl`].
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub id: JobId,
    pub url: String,
    pub destination: PathBuf,
    /// Destination path plus the reserved checkpoint suffix.
    pub checkpoint: PathBuf,
    pub config: JobConfig,
    tls: bool,
}

impl TransferJob {
    /// Validates `url` and derives the checkpoint path from `destination`.
    pub fn new(
        id: JobId,
        url: &str,
        destination: impl Into<PathBuf>,
        config: JobConfig,
    ) -> Result<Self, TransferError> {
        let parsed = url_model::validate_url(url)?;
        let destination = destination.into();
        Ok(Self {
            id,
            url: parsed.to_string(),
            checkpoint: storage::checkpoint_path(&destination),
            destination,
            config,
            tls: parsed.scheme() == "https",
        })
    }

    /// True for `https` URLs.
    pub fn is_tls(&self) -> bool {
        self.tls
    }
}

/// Point-in-time view of a job's bookkeeping values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub state: JobState,
    pub transferred: u64,
    /// `None` until probed or learned from a response.
    pub total: Option<u64>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Bytes per second from the latest sample.
    pub speed: f64,
}
