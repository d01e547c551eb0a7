//! HTTP transfer plumbing shared by the chunk and single-stream downloaders.
//!
//! Every request goes through one curl easy handle per connection. The write
//! callback is where pause and cancel take effect: it blocks on the job's
//! condition variable while paused and aborts the transfer on cancel, so both
//! are observed once per network read unit.

mod chunk;
mod fallback;
pub(crate) mod parallel;
pub(crate) mod single;

pub(crate) use chunk::download_chunk;

use std::cell::RefCell;
use std::io::Write;
use std::ops::Range;
use std::time::Duration;

use curl::easy::Easy;

use crate::config::JobConfig;
use crate::control::JobControl;
use crate::error::TransferError;
use crate::probe::ResponseHead;

const USER_AGENT: &str = concat!("rdm/", env!("CARGO_PKG_VERSION"));

/// New easy handle with the options every request shares.
pub(crate) fn new_handle(url: &str, cfg: &JobConfig) -> Result<Easy, curl::Error> {
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(USER_AGENT)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    // Abort if throughput stays below 1 KiB/s for 60 s.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.buffer_size(cfg.receive_buffer())?;
    easy.progress(true)?;
    Ok(easy)
}

/// The slice of a response body that belongs on disk.
///
/// We asked for `limit` bytes (unbounded when `None`) starting at absolute
/// offset `start`. A 206 body begins at `start`; a 200 body begins at 0, so
/// its leading bytes are dropped. Bytes past the limit are never selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BodyWindow {
    start: u64,
    limit: Option<u64>,
    seen: u64,
    taken: u64,
}

impl BodyWindow {
    pub fn new(start: u64, limit: Option<u64>) -> Self {
        Self {
            start,
            limit,
            seen: 0,
            taken: 0,
        }
    }

    /// Range of `len` freshly received bytes to keep.
    pub fn select(&mut self, status: u32, len: usize) -> Range<usize> {
        let base = if status == 206 { self.start } else { 0 };
        let pos = base + self.seen;
        self.seen += len as u64;

        let want_from = self.start + self.taken;
        let want_to = self.limit.map_or(u64::MAX, |l| self.start + l);
        let lo = want_from.max(pos);
        let hi = want_to.min(pos + len as u64);
        if lo >= hi {
            return 0..0;
        }
        self.taken += hi - lo;
        (lo - pos) as usize..(hi - pos) as usize
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|l| self.taken >= l)
    }

    /// Bytes selected so far.
    pub fn taken(&self) -> u64 {
        self.taken
    }
}

/// What one request produced.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub head: ResponseHead,
    /// Bytes written to `out`.
    pub written: u64,
}

impl Outcome {
    pub fn status(&self) -> u32 {
        self.head.status.unwrap_or(0)
    }
}

/// Performs the request on `easy`, writing the selected body bytes to `out`
/// and crediting them to the job as they land.
///
/// Bodies of responses other than 200/206 are read and discarded; the caller
/// inspects [`Outcome::status`].
pub(crate) fn run_transfer<W: Write>(
    easy: &mut Easy,
    control: &JobControl,
    mut window: BodyWindow,
    out: &mut W,
    mut on_bytes: impl FnMut(u64),
) -> Result<Outcome, TransferError> {
    let head = RefCell::new(ResponseHead::default());
    let mut abort: Option<TransferError> = None;

    let result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            head.borrow_mut().absorb(line);
            true
        })?;
        transfer.progress_function(|_, _, _, _| !control.is_cancelled())?;
        transfer.write_function(|data| {
            if let Err(e) = control.wait_while_paused() {
                abort = Some(e);
                return Ok(0);
            }
            let status = head.borrow().status.unwrap_or(0);
            if status != 200 && status != 206 {
                return Ok(data.len());
            }
            let keep = window.select(status, data.len());
            if !keep.is_empty() {
                let n = keep.len() as u64;
                if let Err(e) = out.write_all(&data[keep]) {
                    abort = Some(TransferError::Storage(e));
                    return Ok(0);
                }
                control.add_transferred(n);
                on_bytes(n);
            }
            // Returning short stops curl once the requested range is on disk.
            if window.is_full() {
                return Ok(0);
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Some(e) = abort {
        return Err(e);
    }
    if let Err(e) = result {
        if control.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        if !(window.is_full() && e.is_write_error()) {
            return Err(TransferError::Transport(e));
        }
    }
    Ok(Outcome {
        head: head.into_inner(),
        written: window.taken(),
    })
}
