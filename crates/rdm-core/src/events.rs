//! Events emitted by the transfer engine.
//!
//! These are the whole observable surface of a job: progress samples, state
//! transitions (including the synthetic `retrying (k/max)` label), completion
//! and failure. Every event carries the job id.

use serde::Serialize;
use std::sync::mpsc;

use crate::job::{JobId, JobState};

/// Event emitted for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Cumulative bytes and instantaneous speed (bytes per second).
    Progress {
        id: JobId,
        transferred: u64,
        total: Option<u64>,
        speed: f64,
    },
    /// The job moved to `state`.
    StateChanged { id: JobId, state: JobState },
    /// Destination file is in place.
    Completed { id: JobId },
    /// The job will not retry further.
    Failed {
        id: JobId,
        error: String,
        retries: u32,
    },
}

impl TransferEvent {
    pub fn id(&self) -> JobId {
        match self {
            TransferEvent::Progress { id, .. }
            | TransferEvent::StateChanged { id, .. }
            | TransferEvent::Completed { id }
            | TransferEvent::Failed { id, .. } => *id,
        }
    }
}

/// Receiver of engine events. Called from supervisor, worker and monitor
/// threads, never while a job mutex or a scheduler registry lock is held, so
/// an implementation may query the scheduler.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TransferEvent);
}

impl EventSink for mpsc::Sender<TransferEvent> {
    fn emit(&self, event: TransferEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}
