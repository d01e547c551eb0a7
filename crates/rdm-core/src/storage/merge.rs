//! Appending chunk part files to the checkpoint.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::{file_len, remove_if_exists};
use crate::error::TransferError;
use crate::segmenter::ChunkSpec;

/// Appends the bytes of `chunk`'s part file that extend the checkpoint, then
/// removes the part. Returns the number of bytes appended.
///
/// A part is usable when the checkpoint ends inside its range. A part whose
/// range is already covered, or that holds nothing past the checkpoint end,
/// is removed. A part beyond the checkpoint end is left alone.
pub fn absorb_part(checkpoint: &Path, chunk: &ChunkSpec) -> io::Result<u64> {
    if !chunk.part_path.exists() {
        return Ok(0);
    }
    let part_len = file_len(&chunk.part_path)?;
    let have = file_len(checkpoint)?;
    if have < chunk.start {
        return Ok(0);
    }
    let skip = have - chunk.start;
    let usable = part_len.min(chunk.len());
    if have > chunk.end || usable <= skip {
        remove_if_exists(&chunk.part_path)?;
        return Ok(0);
    }

    let mut part = File::open(&chunk.part_path)?;
    part.seek(SeekFrom::Start(skip))?;
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(checkpoint)?;
    let copied = io::copy(&mut part.take(usable - skip), &mut out)?;
    out.sync_data()?;
    drop(out);
    fs::remove_file(&chunk.part_path)?;
    tracing::debug!(
        "merged part {} ({} bytes) into {}",
        chunk.index,
        copied,
        checkpoint.display()
    );
    Ok(copied)
}

/// Merges every chunk into the checkpoint strictly in index order.
///
/// Must only run after all chunk workers of the attempt have exited. Chunks
/// already covered by the checkpoint are skipped. A gap or a short part is
/// reported as [`TransferError::Incomplete`].
pub fn merge_parts(checkpoint: &Path, chunks: &[ChunkSpec]) -> Result<(), TransferError> {
    let mut ordered: Vec<&ChunkSpec> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);

    for chunk in ordered {
        let have = file_len(checkpoint)?;
        if have < chunk.start {
            return Err(TransferError::Incomplete {
                expected: chunk.start,
                received: have,
            });
        }
        absorb_part(checkpoint, chunk)?;
        let have = file_len(checkpoint)?;
        if have <= chunk.end {
            return Err(TransferError::Incomplete {
                expected: chunk.end + 1,
                received: have,
            });
        }
    }
    Ok(())
}
