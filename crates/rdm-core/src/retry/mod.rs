//! Retry and backoff policy.
//!
//! Maps transfer errors onto the failure taxonomy (transient, protocol,
//! resource, cancelled) and decides how long the supervisor waits before the
//! next attempt. Chunk workers and the probe use the fixed-delay [`LocalRetry`].

mod classify;
mod policy;

pub use classify::{classify, classify_http_status};
pub use policy::{ErrorKind, LocalRetry, RetryDecision, RetryPolicy};
