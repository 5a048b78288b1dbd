//! Backoff policies for dead proxies.

use std::time::Duration;

/// Maps the number of consecutive failures of a proxy to the time it must
/// sit out before it can be reanimated.
///
/// Implementations must be non-decreasing in `failure_count`. The pool calls
/// this only when a proxy is marked dead, with `failure_count >= 1`.
pub trait Backoff: Send + Sync {
    /// Wait duration for a proxy that has failed `failure_count` times in a row.
    fn duration(&self, failure_count: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn duration(&self, failure_count: u32) -> Duration {
        self(failure_count)
    }
}

/// `min(cap, base * 2^(n - 1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
}

impl ExponentialBackoff {
    /// Create a policy doubling from `base` up to `cap`.
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(3600))
    }
}

impl Backoff for ExponentialBackoff {
    fn duration(&self, failure_count: u32) -> Duration {
        let exponent = failure_count.saturating_sub(1);
        if exponent >= u32::BITS {
            return self.cap;
        }
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

/// Same wait regardless of how many times the proxy failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBackoff(pub Duration);

impl Backoff for ConstantBackoff {
    fn duration(&self, _failure_count: u32) -> Duration {
        self.0
    }
}
