//! Job supervisor: one job's attempts, backoff and terminal state.
//!
//! Each attempt re-probes the server, picks a strategy, runs the matching
//! downloader with a progress monitor alongside, and finalizes the
//! checkpoint. A failed attempt is classified; retryable failures wait out
//! the exponential backoff (cancellable) and try again until the retry
//! budget is spent. Cancellation removes every temp file before the job
//! reports `cancelled`.

use std::fs;
use std::thread;

use crate::control::JobControl;
use crate::downloader::{parallel, single};
use crate::error::TransferError;
use crate::job::{JobState, TransferJob};
use crate::logging;
use crate::monitor::ProgressMonitor;
use crate::probe;
use crate::retry::{classify, RetryDecision};
use crate::storage;
use crate::strategy::{self, Strategy};

/// Runs `job` to a terminal state on the calling thread.
pub(crate) fn run(job: &TransferJob, control: &JobControl) {
    let _span = logging::job_span(job.id).entered();
    let state = match supervise(job, control) {
        Ok(()) => JobState::Completed,
        Err(e) if e.is_cancelled() => {
            storage::discard(&job.checkpoint);
            JobState::Cancelled
        }
        Err(_) => JobState::Failed,
    };
    control.finish(state);
}

fn supervise(job: &TransferJob, control: &JobControl) -> Result<(), TransferError> {
    loop {
        control.wait_while_paused()?;
        if !control.begin_attempt() {
            continue;
        }

        let result = thread::scope(|s| {
            let monitor = ProgressMonitor::spawn(s, control);
            let result = attempt(job, control);
            monitor.stop();
            result
        });
        let err = match result {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if err.is_cancelled() || control.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        control.record_error(&err);

        if control.is_paused() {
            // Interrupted by the operator; resume starts a fresh attempt.
            tracing::info!(job = %job.id, "attempt ended while paused: {}", err);
            continue;
        }

        match job.config.retry.decide(control.retry_count(), classify(&err)) {
            RetryDecision::NoRetry => {
                tracing::warn!(
                    job = %job.id,
                    retries = control.retry_count(),
                    "giving up: {}",
                    err
                );
                return Err(err);
            }
            RetryDecision::RetryAfter(delay) => {
                let retry = control.begin_retry();
                tracing::warn!(
                    job = %job.id,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed: {}",
                    err
                );
                control.sleep(delay)?;
            }
        }
    }
}

fn attempt(job: &TransferJob, control: &JobControl) -> Result<(), TransferError> {
    if let Some(dir) = job.destination.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    control.reset_transferred(storage::file_len(&job.checkpoint)?);

    let cap = probe::probe(&job.url, &job.config, control);
    control.check_cancelled()?;
    if let Some(total) = cap.total_bytes {
        if storage::file_len(&job.checkpoint)? > total {
            tracing::warn!(job = %job.id, total, "checkpoint larger than resource, starting over");
            storage::discard(&job.checkpoint);
            control.reset_transferred(0);
        }
        control.set_total(total);
    }

    let strategy = strategy::select(&cap, job.is_tls(), &job.config);
    tracing::debug!(job = %job.id, ?strategy, "strategy selected");
    match (strategy, cap.total_bytes) {
        (Strategy::Parallel { connections }, Some(total)) => {
            parallel::download(job, control, connections, total)?
        }
        _ => single::download(job, control)?,
    }

    control.check_cancelled()?;
    storage::finalize(&job.checkpoint, &job.destination)?;
    tracing::info!(job = %job.id, "saved {}", job.destination.display());
    Ok(())
}
