//! Per-job control block: pause/cancel flags and the mutable counters.
//!
//! Everything a job's threads share (state, transferred bytes, retry count,
//! last error, speed, the pause and cancel flags) sits behind one mutex. A
//! condition variable wakes paused workers and cancellable sleeps when the
//! flags change, so pause takes effect at the next read unit and cancel is
//! seen without polling delays.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::TransferError;
use crate::events::{EventSink, TransferEvent};
use crate::job::{JobId, JobSnapshot, JobState};

/// What a cancel request found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A supervising thread owns the job; it will clean up and report.
    Running,
    /// Nothing is running; the caller must clean up and report.
    Idle,
    /// Already completed or cancelled; nothing to do.
    Finished,
}

#[derive(Debug)]
struct Status {
    state: JobState,
    transferred: u64,
    total: Option<u64>,
    retry_count: u32,
    max_retries: u32,
    last_error: Option<String>,
    speed: f64,
    paused: bool,
    cancelled: bool,
    running: bool,
}

/// Shared control block for one job.
pub struct JobControl {
    id: JobId,
    status: Mutex<Status>,
    changed: Condvar,
    events: Arc<dyn EventSink>,
}

impl JobControl {
    pub fn new(id: JobId, max_retries: u32, events: Arc<dyn EventSink>) -> Self {
        Self {
            id,
            status: Mutex::new(Status {
                state: JobState::Pending,
                transferred: 0,
                total: None,
                retry_count: 0,
                max_retries,
                last_error: None,
                speed: 0.0,
                paused: false,
                cancelled: false,
                running: false,
            }),
            changed: Condvar::new(),
            events,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let s = self.lock();
        JobSnapshot {
            id: self.id,
            state: s.state,
            transferred: s.transferred,
            total: s.total,
            retry_count: s.retry_count,
            last_error: s.last_error.clone(),
            speed: s.speed,
        }
    }

    pub fn state(&self) -> JobState {
        self.lock().state
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// A supervising thread currently owns this job.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Running and neither paused nor cancelled: holds a scheduler slot.
    pub fn is_active(&self) -> bool {
        let s = self.lock();
        s.running && !s.paused && !s.cancelled
    }

    /// Pending, not running, not paused, not cancelled.
    pub fn is_startable(&self) -> bool {
        let s = self.lock();
        !s.running && !s.paused && !s.cancelled && s.state == JobState::Pending
    }

    pub fn check_cancelled(&self) -> Result<(), TransferError> {
        if self.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Blocks while the job is paused. Returns `Cancelled` once cancel is requested.
    pub fn wait_while_paused(&self) -> Result<(), TransferError> {
        let mut s = self.lock();
        while s.paused && !s.cancelled {
            s = self
                .changed
                .wait(s)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if s.cancelled {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration` unless cancelled first.
    pub fn sleep(&self, duration: Duration) -> Result<(), TransferError> {
        let deadline = Instant::now() + duration;
        let mut s = self.lock();
        loop {
            if s.cancelled {
                return Err(TransferError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            s = self
                .changed
                .wait_timeout(s, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Request pause. Returns false if the job is already paused or finished.
    pub fn pause(&self) -> bool {
        {
            let mut s = self.lock();
            if s.paused || s.cancelled || s.state.is_terminal() {
                return false;
            }
            s.paused = true;
            s.state = JobState::Paused;
        }
        self.changed.notify_all();
        self.announce(JobState::Paused);
        true
    }

    /// Clear the pause flag and reset the automatic retry counter.
    /// A live job goes back to downloading, an idle one back to pending.
    pub fn resume(&self) -> bool {
        match self.take_resume() {
            Some(state) => {
                self.publish_resume(state);
                true
            }
            None => false,
        }
    }

    /// The state half of [`JobControl::resume`]: paused workers stay parked
    /// and nothing is emitted until [`JobControl::publish_resume`].
    pub(crate) fn take_resume(&self) -> Option<JobState> {
        let mut s = self.lock();
        if !s.paused || s.cancelled {
            return None;
        }
        s.paused = false;
        s.retry_count = 0;
        s.state = if s.running {
            JobState::Downloading
        } else {
            JobState::Pending
        };
        Some(s.state)
    }

    /// Announces a resume taken with [`JobControl::take_resume`], then wakes
    /// the parked workers.
    pub(crate) fn publish_resume(&self, state: JobState) {
        self.announce(state);
        self.changed.notify_all();
    }

    /// Re-arm a failed job as a fresh pending execution.
    pub fn rearm(&self) -> bool {
        {
            let mut s = self.lock();
            if s.running || s.state != JobState::Failed {
                return false;
            }
            s.state = JobState::Pending;
            s.retry_count = 0;
            s.last_error = None;
            s.speed = 0.0;
        }
        self.announce(JobState::Pending);
        true
    }

    /// Set the cancel flag and wake every waiter.
    pub fn cancel(&self) -> CancelOutcome {
        let outcome = {
            let mut s = self.lock();
            if s.state == JobState::Completed || s.state == JobState::Cancelled {
                return CancelOutcome::Finished;
            }
            s.cancelled = true;
            s.paused = false;
            if s.running {
                CancelOutcome::Running
            } else {
                CancelOutcome::Idle
            }
        };
        self.changed.notify_all();
        outcome
    }

    /// Claim the job for a supervising thread.
    pub(crate) fn mark_running(&self) -> bool {
        let mut s = self.lock();
        if s.running {
            return false;
        }
        s.running = true;
        true
    }

    pub(crate) fn set_state(&self, state: JobState) {
        self.lock().state = state;
        self.announce(state);
    }

    /// Move to downloading unless a pause slipped in first.
    pub(crate) fn begin_attempt(&self) -> bool {
        {
            let mut s = self.lock();
            if s.paused || s.cancelled {
                return false;
            }
            s.state = JobState::Downloading;
        }
        self.announce(JobState::Downloading);
        true
    }

    /// Count one automatic retry and publish `retrying (k/max)`.
    pub(crate) fn begin_retry(&self) -> u32 {
        let state = {
            let mut s = self.lock();
            s.retry_count += 1;
            s.speed = 0.0;
            s.state = JobState::Retrying {
                attempt: s.retry_count,
                max: s.max_retries,
            };
            s.state
        };
        self.announce(state);
        match state {
            JobState::Retrying { attempt, .. } => attempt,
            _ => 0,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.lock().retry_count
    }

    pub fn transferred(&self) -> u64 {
        self.lock().transferred
    }

    pub fn total(&self) -> Option<u64> {
        self.lock().total
    }

    pub(crate) fn set_total(&self, total: u64) {
        let mut s = self.lock();
        s.total = Some(total);
        s.transferred = s.transferred.min(total);
    }

    /// Credit bytes written to disk. Never exceeds a known total.
    pub(crate) fn add_transferred(&self, bytes: u64) {
        let mut s = self.lock();
        let next = s.transferred.saturating_add(bytes);
        s.transferred = match s.total {
            Some(total) => next.min(total),
            None => next,
        };
    }

    /// Start-of-attempt baseline: bytes already in the checkpoint file.
    pub(crate) fn reset_transferred(&self, bytes: u64) {
        let mut s = self.lock();
        s.transferred = match s.total {
            Some(total) => bytes.min(total),
            None => bytes,
        };
    }

    pub(crate) fn record_error(&self, error: &TransferError) {
        self.lock().last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Store a speed sample and publish a progress event.
    pub(crate) fn report_speed(&self, speed: f64) {
        let (transferred, total) = {
            let mut s = self.lock();
            s.speed = speed;
            (s.transferred, s.total)
        };
        self.events.emit(TransferEvent::Progress {
            id: self.id,
            transferred,
            total,
            speed,
        });
    }

    /// Release the job after its supervising thread is done and publish the terminal state.
    pub(crate) fn finish(&self, state: JobState) {
        let (retries, error) = {
            let mut s = self.lock();
            s.running = false;
            s.state = state;
            s.speed = 0.0;
            s.paused = false;
            if state == JobState::Completed {
                if let Some(total) = s.total {
                    s.transferred = total;
                }
            }
            (s.retry_count, s.last_error.clone())
        };
        self.changed.notify_all();
        self.announce(state);
        match state {
            JobState::Completed => self.events.emit(TransferEvent::Completed { id: self.id }),
            JobState::Failed => self.events.emit(TransferEvent::Failed {
                id: self.id,
                error: error.unwrap_or_else(|| "download failed after maximum retries".to_string()),
                retries,
            }),
            _ => {}
        }
    }

    fn announce(&self, state: JobState) {
        tracing::info!(job = %self.id, state = %state, "state changed");
        self.events.emit(TransferEvent::StateChanged { id: self.id, state });
    }
}
