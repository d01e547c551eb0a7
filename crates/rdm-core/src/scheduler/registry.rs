//! Job registry owned by one scheduler.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::control::JobControl;
use crate::job::{JobId, TransferJob};

pub(super) struct Entry {
    pub job: Arc<TransferJob>,
    pub control: Arc<JobControl>,
    /// Supervising thread of the latest execution.
    pub handle: Option<JoinHandle<()>>,
    /// Resume requested while every slot was taken.
    pub resume_when_free: bool,
}

impl Entry {
    /// Joins the previous execution's thread if it has already exited.
    pub fn reap(&mut self) {
        if self.handle.as_ref().is_some_and(JoinHandle::is_finished) {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

/// Jobs in registration order plus the concurrency limit.
pub(super) struct Registry {
    pub limit: usize,
    next_id: u64,
    pub entries: Vec<Entry>,
}

impl Registry {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn allocate_id(&mut self) -> JobId {
        self.next_id += 1;
        JobId(self.next_id)
    }

    pub fn find(&self, id: JobId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.job.id == id)
    }

    pub fn find_mut(&mut self, id: JobId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.job.id == id)
    }

    pub fn remove(&mut self, id: JobId) -> Option<Entry> {
        let index = self.entries.iter().position(|e| e.job.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Removes terminal entries no thread is working on any more.
    pub fn drain_finished(&mut self) -> Vec<Entry> {
        let (finished, kept) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| {
                !e.control.is_running() && e.control.state().is_terminal() && !e.resume_when_free
            });
        self.entries = kept;
        finished
    }

    /// Jobs holding a slot: alive, not paused, not cancelled.
    pub fn active(&self) -> usize {
        self.entries.iter().filter(|e| e.control.is_active()).count()
    }
}
