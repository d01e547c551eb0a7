//! Single-connection completion of a parallel plan.
//!
//! Walks the chunks in index order. Each part file that lines up with the
//! checkpoint end is appended first (complete or a partial prefix), and only
//! the bytes still missing from that range are requested. Finished parts are
//! never fetched again.

use super::single;
use crate::control::JobControl;
use crate::error::TransferError;
use crate::job::TransferJob;
use crate::segmenter::ChunkSpec;
use crate::storage;

pub(crate) fn download(
    job: &TransferJob,
    control: &JobControl,
    plan: &[ChunkSpec],
) -> Result<(), TransferError> {
    for chunk in plan {
        control.check_cancelled()?;
        let absorbed = storage::absorb_part(&job.checkpoint, chunk)?;
        let have = storage::file_len(&job.checkpoint)?;
        if have < chunk.start {
            return Err(TransferError::Incomplete {
                expected: chunk.start,
                received: have,
            });
        }
        if have > chunk.end {
            continue;
        }
        tracing::debug!(
            job = %job.id,
            chunk = chunk.index,
            absorbed,
            missing = chunk.end + 1 - have,
            "fallback fetching rest of chunk"
        );
        single::stream(job, control, Some(chunk.end))?;
    }
    Ok(())
}
