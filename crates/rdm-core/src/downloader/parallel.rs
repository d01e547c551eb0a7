//! Parallel attempt: one worker per chunk, merge in index order.

use std::thread;

use super::{download_chunk, fallback};
use crate::control::JobControl;
use crate::error::TransferError;
use crate::job::TransferJob;
use crate::retry::{classify, ErrorKind};
use crate::segmenter::plan_chunks;
use crate::storage;

/// Downloads `[checkpoint size, total)` over `connections` connections.
///
/// Workers run in a thread scope, so every worker has exited before the
/// merge or the fallback touches the checkpoint. If any chunk fails for a
/// reason other than cancellation or a resource error, the attempt falls
/// back once to a single connection that reuses the part files on disk.
pub(crate) fn download(
    job: &TransferJob,
    control: &JobControl,
    connections: usize,
    total: u64,
) -> Result<(), TransferError> {
    let have = storage::file_len(&job.checkpoint)?;
    let plan = plan_chunks(&job.checkpoint, have, total, connections);
    let Some(first) = plan.first() else {
        return Ok(());
    };
    // Part bytes from earlier attempts count once, on top of the first
    // chunk's start. That start never lies above the checkpoint size, and
    // when it lies below, its part already reaches the checkpoint.
    let on_disk = plan
        .iter()
        .map(|c| storage::file_len(&c.part_path).map(|len| len.min(c.len())))
        .sum::<std::io::Result<u64>>()?;
    let baseline = first.start + on_disk;
    control.reset_transferred(baseline.max(have));
    tracing::debug!(
        job = %job.id,
        chunks = plan.len(),
        from = have,
        first = first.start,
        on_disk,
        total,
        "parallel transfer"
    );

    let span = tracing::Span::current();
    let results: Vec<Result<(), TransferError>> = thread::scope(|s| {
        let workers: Vec<_> = plan
            .iter()
            .map(|chunk| {
                let span = span.clone();
                s.spawn(move || {
                    let _span = span.entered();
                    download_chunk(job, control, chunk)
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap_or(Err(TransferError::WorkerPanicked)))
            .collect()
    });

    control.check_cancelled()?;
    let mut failure = None;
    for result in results {
        let Err(e) = result else { continue };
        match classify(&e) {
            ErrorKind::Cancelled => return Err(TransferError::Cancelled),
            ErrorKind::Resource => return Err(e),
            _ => {
                failure.get_or_insert(e);
            }
        }
    }

    match failure {
        None => storage::merge_parts(&job.checkpoint, &plan),
        Some(e) => {
            tracing::warn!(
                job = %job.id,
                "chunk failed ({}), finishing over a single connection",
                e
            );
            fallback::download(job, control, &plan)
        }
    }
}
