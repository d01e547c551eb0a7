//! Transfer error type shared by the probe, the downloaders and the supervisor.

use thiserror::Error;

/// Error returned by one piece of a transfer (probe, chunk, stream, merge).
///
/// Only the supervisor decides whether an error ends the job; see
/// [`crate::retry::classify`] for how each variant is treated.
#[derive(Debug, Error)]
pub enum TransferError {
    /// URL is not an absolute `http`/`https` URL with a host.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Curl reported a transport failure (timeout, reset, DNS, TLS).
    #[error("{0}")]
    Transport(#[from] curl::Error),
    /// Server answered with a status other than 200/206.
    #[error("HTTP {0}")]
    Http(u32),
    /// Server answered 416 to a resume request.
    #[error("HTTP 416: range not satisfiable")]
    RangeNotSatisfiable,
    /// Body ended before the expected number of bytes was on disk.
    #[error("incomplete transfer: expected {expected} bytes, have {received}")]
    Incomplete { expected: u64, received: u64 },
    /// Disk write, merge or rename failed (disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    /// A chunk worker thread panicked.
    #[error("chunk worker panicked")]
    WorkerPanicked,
    /// The job was cancelled while this operation was running.
    #[error("cancelled")]
    Cancelled,
}

impl TransferError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }
}
