#![allow(dead_code)]

pub mod range_server;

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rdm_core::retry::{LocalRetry, RetryPolicy};
use rdm_core::{JobConfig, JobId, JobState, Scheduler, TransferEvent};

/// Deterministic, non-repeating-looking body of `len` bytes.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + i / 251) as u8).collect()
}

/// Fast retries so failure paths finish in milliseconds.
pub fn fast_config(connections: usize, max_retries: u32) -> JobConfig {
    JobConfig {
        connections,
        retry: RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        },
        local_retry: LocalRetry {
            attempts: 2,
            delay: Duration::from_millis(10),
        },
        ..JobConfig::default()
    }
}

pub fn scheduler(limit: usize) -> (Scheduler, Receiver<TransferEvent>) {
    let (tx, rx) = mpsc::channel();
    (Scheduler::new(limit, Arc::new(tx)), rx)
}

/// Collects events until `done` returns true for one of them (inclusive).
pub fn collect_until(
    rx: &Receiver<TransferEvent>,
    timeout: Duration,
    mut done: impl FnMut(&TransferEvent) -> bool,
) -> Vec<TransferEvent> {
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let event = rx
            .recv_timeout(left)
            .unwrap_or_else(|_| panic!("timed out; events so far: {:?}", events));
        let stop = done(&event);
        events.push(event);
        if stop {
            return events;
        }
    }
}

/// True for the last event of `id`'s execution. `Completed` and `Failed`
/// follow their state change; a cancellation has only the state change.
pub fn ends(id: JobId, event: &TransferEvent) -> bool {
    match event {
        TransferEvent::Completed { id: e } | TransferEvent::Failed { id: e, .. } => *e == id,
        TransferEvent::StateChanged { id: e, state } => *e == id && *state == JobState::Cancelled,
        _ => false,
    }
}

/// Collects events until every job in `ids` reached a terminal state.
pub fn wait_all(rx: &Receiver<TransferEvent>, ids: &[JobId]) -> Vec<TransferEvent> {
    let mut left: Vec<JobId> = ids.to_vec();
    collect_until(rx, Duration::from_secs(30), |e| {
        left.retain(|id| !ends(*id, e));
        left.is_empty()
    })
}

/// State transitions of `id` in event order.
pub fn states(events: &[TransferEvent], id: JobId) -> Vec<JobState> {
    events
        .iter()
        .filter_map(|e| match e {
            TransferEvent::StateChanged { id: e, state } if *e == id => Some(*state),
            _ => None,
        })
        .collect()
}
