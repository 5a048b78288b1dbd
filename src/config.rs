//! Configuration for the proxy pool.

use std::time::Duration;

/// What [`ProxyPool::add`](crate::ProxyPool::add) does when the hostport is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail with [`ProxyPoolError::Duplicate`](crate::ProxyPoolError::Duplicate).
    #[default]
    Reject,
    /// Replace the stored address, keeping status and failure history.
    Overwrite,
}

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Initial proxy addresses.
    pub proxies: Vec<String>,
    /// Backoff after the first failure.
    pub backoff_base: Duration,
    /// Upper bound for the backoff.
    pub backoff_cap: Duration,
    /// Handling of addresses whose hostport is already in the pool.
    pub duplicate_policy: DuplicatePolicy,
    /// Number of distinct proxies to try for one request.
    pub max_proxies_to_try: usize,
    /// Fail requests instead of resetting dead proxies when none is available.
    pub stop_if_no_proxies: bool,
    /// Interval between reanimation sweeps.
    pub reanimate_interval: Duration,
    /// Timeout for a single request attempt through a proxy.
    pub request_timeout: Duration,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    proxies: Vec<String>,
    backoff_base: Option<Duration>,
    backoff_cap: Option<Duration>,
    duplicate_policy: Option<DuplicatePolicy>,
    max_proxies_to_try: Option<usize>,
    stop_if_no_proxies: Option<bool>,
    reanimate_interval: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            proxies: Vec::new(),
            backoff_base: None,
            backoff_cap: None,
            duplicate_policy: None,
            max_proxies_to_try: None,
            stop_if_no_proxies: None,
            reanimate_interval: None,
            request_timeout: None,
        }
    }

    /// Set the initial proxy addresses.
    pub fn proxies(mut self, proxies: Vec<impl Into<String>>) -> Self {
        self.proxies = proxies.into_iter().map(Into::into).collect();
        self
    }

    /// Set the backoff after the first failure.
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    /// Set the upper bound for the backoff.
    pub fn backoff_cap(mut self, cap: Duration) -> Self {
        self.backoff_cap = Some(cap);
        self
    }

    /// Set the handling of duplicate hostports.
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = Some(policy);
        self
    }

    /// Set the number of distinct proxies to try for one request.
    pub fn max_proxies_to_try(mut self, count: usize) -> Self {
        self.max_proxies_to_try = Some(count);
        self
    }

    /// Fail requests instead of resetting dead proxies when none is available.
    pub fn stop_if_no_proxies(mut self, stop: bool) -> Self {
        self.stop_if_no_proxies = Some(stop);
        self
    }

    /// Set the interval between reanimation sweeps.
    pub fn reanimate_interval(mut self, interval: Duration) -> Self {
        self.reanimate_interval = Some(interval);
        self
    }

    /// Set the timeout for a single request attempt.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            proxies: self.proxies,
            backoff_base: self.backoff_base.unwrap_or(Duration::from_secs(5)),
            backoff_cap: self.backoff_cap.unwrap_or(Duration::from_secs(3600)),
            duplicate_policy: self.duplicate_policy.unwrap_or_default(),
            max_proxies_to_try: self.max_proxies_to_try.unwrap_or(6).max(1),
            stop_if_no_proxies: self.stop_if_no_proxies.unwrap_or(false),
            reanimate_interval: self.reanimate_interval.unwrap_or(Duration::from_secs(5)),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
