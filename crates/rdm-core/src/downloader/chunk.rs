//! One byte range into its own part file, with local retry.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use super::{new_handle, run_transfer, BodyWindow};
use crate::control::JobControl;
use crate::error::TransferError;
use crate::job::TransferJob;
use crate::retry::{classify, ErrorKind};
use crate::segmenter::ChunkSpec;
use crate::storage;

/// Brings `chunk.part_path` to exactly `chunk.len()` bytes.
///
/// Bytes already in the part file are never fetched again; the caller credits
/// them before the workers start. Each try opens a fresh connection and asks
/// for the range from the current part size onward; partial bytes from a
/// failed try are kept. Transient and
/// protocol errors are retried `local_retry.attempts` times; the last error is
/// recorded on the job and returned.
pub(crate) fn download_chunk(
    job: &TransferJob,
    control: &JobControl,
    chunk: &ChunkSpec,
) -> Result<(), TransferError> {
    if storage::file_len(&chunk.part_path)? >= chunk.len() {
        tracing::debug!(job = %job.id, chunk = chunk.index, "chunk already on disk");
        return Ok(());
    }

    let local = job.config.local_retry;
    let mut attempt = 0;
    loop {
        attempt += 1;
        control.check_cancelled()?;
        let err = match fetch(job, control, chunk) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let kind = classify(&err);
        if kind == ErrorKind::Cancelled || control.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        control.record_error(&err);
        if kind == ErrorKind::Resource || attempt >= local.attempts {
            tracing::warn!(
                job = %job.id,
                chunk = chunk.index,
                attempt,
                "chunk failed: {}",
                err
            );
            return Err(err);
        }
        tracing::debug!(
            job = %job.id,
            chunk = chunk.index,
            attempt,
            "chunk request failed, retrying: {}",
            err
        );
        control.sleep(local.delay)?;
    }
}

fn fetch(job: &TransferJob, control: &JobControl, chunk: &ChunkSpec) -> Result<(), TransferError> {
    let have = storage::file_len(&chunk.part_path)?;
    if have >= chunk.len() {
        return Ok(());
    }

    let mut easy = new_handle(&job.url, &job.config)?;
    easy.fresh_connect(true)?;
    easy.forbid_reuse(true)?;
    easy.range(&chunk.range_from(have))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&chunk.part_path)?;
    let mut out = BufWriter::with_capacity(job.config.write_buffer(), file);
    let window = BodyWindow::new(chunk.start + have, Some(chunk.len() - have));
    let outcome = run_transfer(&mut easy, control, window, &mut out, |_| {});
    // Keep whatever arrived, even when the request failed.
    let flushed = out.flush();
    let outcome = outcome?;
    flushed?;

    match outcome.status() {
        200 | 206 => {}
        status => return Err(TransferError::Http(status)),
    }
    let received = have + outcome.written;
    if received < chunk.len() {
        return Err(TransferError::Incomplete {
            expected: chunk.len(),
            received,
        });
    }
    Ok(())
}
