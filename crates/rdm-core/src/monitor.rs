//! Progress monitor: periodic speed samples while an attempt runs.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

use crate::control::JobControl;

/// Sampling period.
pub const TICK: Duration = Duration::from_millis(300);

/// Sampler thread bound to one attempt's scope.
pub(crate) struct ProgressMonitor<'scope> {
    stop: mpsc::Sender<()>,
    handle: ScopedJoinHandle<'scope, ()>,
}

impl<'scope> ProgressMonitor<'scope> {
    pub fn spawn<'env>(scope: &'scope Scope<'scope, 'env>, control: &'env JobControl) -> Self {
        let (stop, stopped) = mpsc::channel();
        let handle = scope.spawn(move || sample(control, stopped));
        Self { stop, handle }
    }

    /// Stops sampling and waits for the thread to exit.
    pub fn stop(self) {
        drop(self.stop);
        let _ = self.handle.join();
    }
}

fn sample(control: &JobControl, stopped: mpsc::Receiver<()>) {
    let mut at = Instant::now();
    let mut bytes = control.transferred();
    loop {
        match stopped.recv_timeout(TICK) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => return,
        }
        let now = Instant::now();
        let current = control.transferred();
        // While paused, move the baseline so idle time never counts.
        if !control.is_paused() {
            let elapsed = now.duration_since(at).as_secs_f64();
            if elapsed > 0.0 {
                control.report_speed(current.saturating_sub(bytes) as f64 / elapsed);
            }
        }
        at = now;
        bytes = current;
    }
}
