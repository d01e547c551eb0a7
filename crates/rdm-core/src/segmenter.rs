//! Range planning for parallel transfers.
//!
//! Chunk ends sit on a fixed grid derived from `(total, n)`, and every part
//! file name carries the offset of its first byte, so a part keeps meaning the
//! same bytes however the checkpoint grows between attempts (merge,
//! single-stream fallback, restart). Chunks that lie entirely below the
//! checkpoint size are omitted from the plan. The chunk the checkpoint ends in
//! starts at the checkpoint size, unless a part begun at its grid start
//! already reaches that far.

use std::fs;
use std::path::{Path, PathBuf};

use crate::storage;

/// One byte range assigned to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    /// First byte of the range; the part file's first byte.
    pub start: u64,
    /// Last byte of the range (inclusive).
    pub end: u64,
    /// Position on the grid; merge order.
    pub index: usize,
    pub part_path: PathBuf,
}

impl ChunkSpec {
    /// Bytes in `[start, end]`.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Curl range value (inclusive end), starting `offset` bytes into the chunk.
    pub fn range_from(&self, offset: u64) -> String {
        format!("{}-{}", self.start + offset, self.end)
    }
}

/// Plans the chunks still needed to bring the checkpoint from `start` bytes to `total`.
///
/// `n` is clamped to `1..=total` so no chunk is empty. Chunk `i` covers
/// `[i*q, (i+1)*q - 1]` with `q = total / n`; the last chunk absorbs the
/// remainder. A chunk straddling `start` is shortened to begin at `start`,
/// unless its grid-aligned part file already holds bytes up to `start`; then
/// it keeps the grid start and the shared bytes are skipped at merge time.
pub fn plan_chunks(checkpoint: &Path, start: u64, total: u64, n: usize) -> Vec<ChunkSpec> {
    if total == 0 || start >= total {
        return Vec::new();
    }
    let n = (n.max(1) as u64).min(total);
    let q = total / n;

    (0..n)
        .filter_map(|i| {
            let grid_start = i * q;
            let end = if i == n - 1 { total - 1 } else { (i + 1) * q - 1 };
            if end < start {
                return None;
            }
            let index = i as usize;
            let chunk_start = if grid_start < start
                && !part_reaches(checkpoint, index, grid_start, start)
            {
                start
            } else {
                grid_start
            };
            Some(ChunkSpec {
                start: chunk_start,
                end,
                index,
                part_path: storage::part_path(checkpoint, index, chunk_start),
            })
        })
        .collect()
}

/// Whether the part begun at `grid_start` covers everything up to `offset`.
fn part_reaches(checkpoint: &Path, index: usize, grid_start: u64, offset: u64) -> bool {
    fs::metadata(storage::part_path(checkpoint, index, grid_start))
        .is_ok_and(|m| m.len() >= offset - grid_start)
}
