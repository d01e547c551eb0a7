//! Single- vs multi-connection decision.

use crate::config::JobConfig;
use crate::probe::Capability;

/// Below this size parallelism is not worth the extra connections.
pub const SMALL_FILE_THRESHOLD: u64 = 1024 * 1024;
/// Above this size encrypted transfers stay on one connection.
pub const LARGE_TLS_THRESHOLD: u64 = 500 * 1024 * 1024;
/// Connection cap for encrypted parallel transfers.
pub const TLS_MAX_CONNECTIONS: usize = 4;

/// How one attempt transfers the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SingleStream,
    Parallel { connections: usize },
}

/// Picks the strategy for one attempt. Pure; re-evaluated every attempt.
pub fn select(cap: &Capability, tls: bool, cfg: &JobConfig) -> Strategy {
    if !cap.supports_ranges {
        return Strategy::SingleStream;
    }
    let total = match cap.total_bytes {
        Some(total) if total >= SMALL_FILE_THRESHOLD => total,
        _ => return Strategy::SingleStream,
    };
    if tls && cfg.force_single_tls && total > LARGE_TLS_THRESHOLD {
        return Strategy::SingleStream;
    }
    let connections = if tls {
        cfg.connections.min(TLS_MAX_CONNECTIONS)
    } else {
        cfg.connections
    };
    if connections <= 1 {
        return Strategy::SingleStream;
    }
    Strategy::Parallel { connections }
}
