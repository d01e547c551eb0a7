//! Single-connection download appending to the checkpoint file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

use super::{new_handle, run_transfer, BodyWindow};
use crate::control::JobControl;
use crate::error::TransferError;
use crate::job::TransferJob;
use crate::storage;

/// Minimum spacing between in-loop speed reports.
const SAMPLE_EVERY: Duration = Duration::from_millis(500);

/// In-loop speed sampling, independent of the progress monitor's tick.
struct SpeedSampler {
    at: Instant,
    bytes: u64,
}

impl SpeedSampler {
    fn new(control: &JobControl) -> Self {
        Self {
            at: Instant::now(),
            bytes: control.transferred(),
        }
    }

    fn tick(&mut self, control: &JobControl) {
        let elapsed = self.at.elapsed();
        if elapsed < SAMPLE_EVERY {
            return;
        }
        let now = control.transferred();
        let speed = now.saturating_sub(self.bytes) as f64 / elapsed.as_secs_f64();
        control.report_speed(speed);
        self.at = Instant::now();
        self.bytes = now;
    }
}

/// Whole remaining resource over one connection.
///
/// A 416 answer to a resume request means the checkpoint already holds the
/// whole resource when its size matches the known total (or no total is
/// known); otherwise the checkpoint is truncated and the transfer restarts
/// from byte 0 once.
pub(crate) fn download(job: &TransferJob, control: &JobControl) -> Result<(), TransferError> {
    match stream(job, control, None) {
        Err(TransferError::RangeNotSatisfiable) => {
            let have = storage::file_len(&job.checkpoint)?;
            match control.total() {
                Some(total) if total == have => Ok(()),
                None if have > 0 => {
                    control.set_total(have);
                    Ok(())
                }
                total => {
                    tracing::warn!(
                        job = %job.id,
                        have,
                        ?total,
                        "range not satisfiable with inconsistent checkpoint, restarting from 0"
                    );
                    File::create(&job.checkpoint)?;
                    control.reset_transferred(0);
                    stream(job, control, None)
                }
            }
        }
        other => other,
    }
}

/// Appends bytes from the checkpoint's current size up to `end` (inclusive),
/// or to the end of the resource when `end` is `None`.
pub(crate) fn stream(
    job: &TransferJob,
    control: &JobControl,
    end: Option<u64>,
) -> Result<(), TransferError> {
    let offset = storage::file_len(&job.checkpoint)?;
    let limit = end.map(|e| (e + 1).saturating_sub(offset));
    if limit == Some(0) {
        return Ok(());
    }

    let mut easy = new_handle(&job.url, &job.config)?;
    match end {
        Some(e) => easy.range(&format!("{offset}-{e}"))?,
        None if offset > 0 => easy.range(&format!("{offset}-"))?,
        None => {}
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&job.checkpoint)?;
    let mut out = BufWriter::with_capacity(job.config.write_buffer(), file);
    let mut sampler = SpeedSampler::new(control);
    let outcome = run_transfer(
        &mut easy,
        control,
        BodyWindow::new(offset, limit),
        &mut out,
        |_| sampler.tick(control),
    );
    let flushed = out.flush();
    let outcome = outcome?;
    flushed?;

    match outcome.status() {
        200 | 206 => {}
        416 => {
            if let Some(total) = outcome.head.resource_total() {
                control.set_total(total);
            }
            return Err(TransferError::RangeNotSatisfiable);
        }
        status => return Err(TransferError::Http(status)),
    }

    if control.total().is_none() {
        if let Some(total) = outcome.head.resource_total() {
            control.set_total(total);
        }
    }
    let received = offset + outcome.written;
    let expected = match end {
        Some(e) => Some(e + 1),
        None => control.total(),
    };
    match expected {
        Some(expected) if received < expected => Err(TransferError::Incomplete { expected, received }),
        Some(_) => Ok(()),
        None => {
            // No size was ever announced; the server closing the body is the end.
            control.set_total(received);
            Ok(())
        }
    }
}
