use std::time::Duration;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeouts, connection resets, truncated bodies, 5xx and 429.
    Transient,
    /// Server misbehaviour around ranges or unexpected statuses. Absorbed by
    /// strategy downgrade where possible, otherwise retried like a transient error.
    Protocol,
    /// Disk full, permission denied, panicked worker. Retrying cannot help.
    Resource,
    /// Cooperative cancellation; never retried.
    Cancelled,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Job-level exponential backoff: the k-th retry waits `min(base * 2^k, max_delay)`.
///
/// With the default one-second base this is `min(2^k s, 60 s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Automatic retries allowed after the first attempt.
    pub max_retries: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = 1u32 << retry.min(16);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    /// Decide what to do after a failed attempt when `retries_so_far`
    /// automatic retries have already been spent.
    pub fn decide(&self, retries_so_far: u32, kind: ErrorKind) -> RetryDecision {
        match kind {
            ErrorKind::Resource | ErrorKind::Cancelled => RetryDecision::NoRetry,
            ErrorKind::Transient | ErrorKind::Protocol => {
                if retries_so_far >= self.max_retries {
                    RetryDecision::NoRetry
                } else {
                    RetryDecision::RetryAfter(self.backoff(retries_so_far + 1))
                }
            }
        }
    }
}

/// Fixed-delay retry used inside an attempt (capability probe, chunk requests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalRetry {
    /// Tries including the first.
    pub attempts: u32,
    /// Pause between tries.
    pub delay: Duration,
}

impl Default for LocalRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}
