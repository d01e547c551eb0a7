//! Transfer scheduler: bounded-concurrency admission across jobs.
//!
//! Each scheduler owns its registry, so several engines can live in one
//! process. A job holds a slot while its supervising thread is alive and the
//! job is neither paused nor cancelled. Whenever a slot may have freed (admit,
//! limit change, pause, resume, cancel, a job ending) pending jobs start in
//! registration order until the limit is reached.
//!
//! Lock order is registry, then job. Threads are never joined and events are
//! never emitted while the registry lock is held. Finished jobs stay
//! registered, so their snapshots stay readable, until `clear_finished`.

mod registry;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::config::JobConfig;
use crate::control::{CancelOutcome, JobControl};
use crate::error::TransferError;
use crate::events::EventSink;
use crate::job::{JobId, JobSnapshot, JobState, TransferJob};
use crate::storage;
use crate::supervisor;
use registry::{Entry, Registry};

struct Inner {
    registry: Mutex<Registry>,
    events: Arc<dyn EventSink>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs admitted jobs with at most `limit` transferring at a time.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// `limit` is clamped to at least 1.
    pub fn new(limit: usize, events: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::new(limit.max(1))),
                events,
            }),
        }
    }

    /// Registers a download and starts it if a slot is free.
    ///
    /// The URL is validated first; an invalid URL creates no job.
    pub fn admit(
        &self,
        url: &str,
        destination: impl Into<PathBuf>,
        config: JobConfig,
    ) -> Result<JobId, TransferError> {
        let id = self.inner.lock().allocate_id();
        let job = TransferJob::new(id, url, destination, config)?;
        let control = JobControl::new(id, config.retry.max_retries, Arc::clone(&self.inner.events));
        tracing::info!(
            job = %id,
            url = %job.url,
            destination = %job.destination.display(),
            "job admitted"
        );
        control.set_state(JobState::Pending);

        self.inner.lock().entries.push(Entry {
            job: Arc::new(job),
            control: Arc::new(control),
            handle: None,
            resume_when_free: false,
        });
        fill_slots(&self.inner);
        Ok(id)
    }

    /// Changes the limit (clamped to at least 1) and fills any freed slots.
    /// Jobs already running beyond a lowered limit are not interrupted.
    pub fn set_concurrency_limit(&self, limit: usize) {
        self.inner.lock().limit = limit.max(1);
        fill_slots(&self.inner);
    }

    pub fn concurrency_limit(&self) -> usize {
        self.inner.lock().limit
    }

    /// Pauses a job; its slot becomes available to queued jobs.
    pub fn pause(&self, id: JobId) -> bool {
        let control = {
            let mut reg = self.inner.lock();
            let Some(entry) = reg.find_mut(id) else {
                return false;
            };
            entry.resume_when_free = false;
            Arc::clone(&entry.control)
        };
        let paused = control.pause();
        if paused {
            fill_slots(&self.inner);
        }
        paused
    }

    /// Resumes a paused job or re-arms a failed one.
    ///
    /// A paused job that is still running needs a slot; when none is free
    /// the resume is deferred until one frees. Resume resets the automatic
    /// retry counter.
    pub fn resume(&self, id: JobId) -> bool {
        let (control, taken) = {
            let mut reg = self.inner.lock();
            let full = reg.active() >= reg.limit;
            let Some(entry) = reg.find_mut(id) else {
                return false;
            };
            if entry.control.is_paused() && entry.control.is_running() && full {
                tracing::debug!(job = %id, "resume deferred until a slot frees");
                entry.resume_when_free = true;
                return true;
            }
            // Taken under the lock so the slot count stays exact.
            let taken = entry.control.take_resume();
            (Arc::clone(&entry.control), taken)
        };
        let resumed = match taken {
            Some(state) => {
                control.publish_resume(state);
                true
            }
            None => control.rearm(),
        };
        if resumed {
            fill_slots(&self.inner);
        }
        resumed
    }

    /// Cancels a job and removes it from the registry.
    ///
    /// A running job stops its workers and deletes its temp files before
    /// this returns. Returns false for unknown, completed or already
    /// cancelled jobs.
    pub fn cancel(&self, id: JobId) -> bool {
        let (mut entry, outcome) = {
            let mut reg = self.inner.lock();
            let Some(entry) = reg.find(id) else {
                return false;
            };
            let outcome = entry.control.cancel();
            if outcome == CancelOutcome::Finished {
                return false;
            }
            match reg.remove(id) {
                Some(entry) => (entry, outcome),
                None => return false,
            }
        };

        match outcome {
            CancelOutcome::Idle => {
                storage::discard(&entry.job.checkpoint);
                entry.control.finish(JobState::Cancelled);
                if let Some(handle) = entry.handle.take() {
                    let _ = handle.join();
                }
            }
            CancelOutcome::Running | CancelOutcome::Finished => {
                if let Some(handle) = entry.handle.take() {
                    let _ = handle.join();
                }
            }
        }
        tracing::info!(job = %id, "job cancelled");
        fill_slots(&self.inner);
        true
    }

    /// Drops completed and failed jobs whose threads have exited. Returns
    /// their ids in registration order; they no longer answer `snapshot`.
    pub fn clear_finished(&self) -> Vec<JobId> {
        let removed = self.inner.lock().drain_finished();
        let ids = removed.iter().map(|e| e.job.id).collect::<Vec<_>>();
        for mut entry in removed {
            if let Some(handle) = entry.handle.take() {
                let _ = handle.join();
            }
        }
        if !ids.is_empty() {
            tracing::debug!(jobs = ids.len(), "cleared finished jobs");
        }
        ids
    }

    /// Current bookkeeping values of a job.
    pub fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        let control = Arc::clone(&self.inner.lock().find(id)?.control);
        Some(control.snapshot())
    }

    /// Snapshots of every registered job in registration order.
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let controls: Vec<Arc<JobControl>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|e| Arc::clone(&e.control))
            .collect();
        controls.iter().map(|c| c.snapshot()).collect()
    }
}

/// Starts queued jobs and applies deferred resumes until the limit is reached.
///
/// State changes happen under the registry lock; their events are published
/// after it is released.
fn fill_slots(inner: &Arc<Inner>) {
    let mut resumed = Vec::new();
    let mut failed = Vec::new();
    {
        let mut reg = inner.lock();
        let limit = reg.limit;
        let mut active = reg.active();

        for entry in reg.entries.iter_mut() {
            if active >= limit {
                break;
            }
            if entry.resume_when_free {
                entry.resume_when_free = false;
                if let Some(state) = entry.control.take_resume() {
                    if entry.control.is_running() {
                        active += 1;
                    }
                    resumed.push((Arc::clone(&entry.control), state));
                }
                continue;
            }
            if !entry.control.is_startable() || !entry.control.mark_running() {
                continue;
            }
            entry.reap();

            let job = Arc::clone(&entry.job);
            let control = Arc::clone(&entry.control);
            let scheduler = Arc::clone(inner);
            let spawned = thread::Builder::new()
                .name(format!("rdm-job-{}", job.id))
                .spawn(move || {
                    supervisor::run(&job, &control);
                    fill_slots(&scheduler);
                });
            match spawned {
                Ok(handle) => {
                    entry.handle = Some(handle);
                    active += 1;
                }
                Err(e) => {
                    tracing::error!(job = %entry.job.id, "failed to spawn job thread: {}", e);
                    entry.control.record_error(&TransferError::Storage(e));
                    failed.push(Arc::clone(&entry.control));
                }
            }
        }
    }

    for (control, state) in resumed {
        control.publish_resume(state);
    }
    for control in failed {
        control.finish(JobState::Failed);
    }
}
