//! Proxy representation and status.

use std::fmt;
use std::time::{Duration, Instant};

/// Status of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyStatus {
    /// The proxy has not been used yet, or came back from `Dead`.
    Unchecked,
    /// The last request through this proxy succeeded.
    Good,
    /// The last request through this proxy failed; it waits out its backoff.
    Dead,
}

impl ProxyStatus {
    /// Whether the proxy can be handed out for new requests.
    pub fn is_eligible(self) -> bool {
        matches!(self, ProxyStatus::Unchecked | ProxyStatus::Good)
    }
}

impl fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProxyStatus::Unchecked => "UNCHECKED",
            ProxyStatus::Good => "GOOD",
            ProxyStatus::Dead => "DEAD",
        };
        f.write_str(name)
    }
}

// The dead timestamp only exists while dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProxyState {
    Unchecked,
    Good,
    Dead { since: Instant, backoff: Duration },
}

/// Representation of a proxy in the pool.
///
/// Values handed out by the pool are snapshots; changing the pool does not
/// change a `Proxy` already returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    address: String,
    hostport: String,
    state: ProxyState,
    failure_count: u32,
}

impl Proxy {
    pub(crate) fn new(address: String, hostport: String) -> Self {
        Self {
            address,
            hostport,
            state: ProxyState::Unchecked,
            failure_count: 0,
        }
    }

    /// The full address, possibly with scheme and credentials.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The `host:port` lookup key.
    pub fn hostport(&self) -> &str {
        &self.hostport
    }

    pub fn status(&self) -> ProxyStatus {
        match self.state {
            ProxyState::Unchecked => ProxyStatus::Unchecked,
            ProxyState::Good => ProxyStatus::Good,
            ProxyState::Dead { .. } => ProxyStatus::Dead,
        }
    }

    /// Consecutive failures since creation or the last success.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// When the proxy was last marked dead, if it is dead.
    pub fn dead_since(&self) -> Option<Instant> {
        match self.state {
            ProxyState::Dead { since, .. } => Some(since),
            _ => None,
        }
    }

    /// The backoff computed when the proxy was last marked dead, if it is dead.
    pub fn backoff_duration(&self) -> Option<Duration> {
        match self.state {
            ProxyState::Dead { backoff, .. } => Some(backoff),
            _ => None,
        }
    }

    /// Whether the backoff has elapsed at `at`. Always false unless dead.
    pub fn is_expired(&self, at: Instant) -> bool {
        match self.state {
            ProxyState::Dead { since, backoff } => at.saturating_duration_since(since) >= backoff,
            _ => false,
        }
    }

    pub(crate) fn set_address(&mut self, address: String) {
        self.address = address;
    }

    pub(crate) fn mark_good(&mut self) {
        self.state = ProxyState::Good;
        self.failure_count = 0;
    }

    pub(crate) fn mark_dead(&mut self, at: Instant, backoff: Duration) {
        self.state = ProxyState::Dead { since: at, backoff };
    }

    pub(crate) fn record_failure(&mut self) -> u32 {
        self.failure_count = self.failure_count.saturating_add(1);
        self.failure_count
    }

    /// Dead to unchecked, keeping the failure count. Returns false if not dead.
    pub(crate) fn revive(&mut self) -> bool {
        if matches!(self.state, ProxyState::Dead { .. }) {
            self.state = ProxyState::Unchecked;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_proxy() -> Proxy {
        Proxy::new("http://u:p@1.2.3.4:8000".to_string(), "1.2.3.4:8000".to_string())
    }

    #[test]
    fn test_new_proxy_is_unchecked() {
        let proxy = test_proxy();
        assert_eq!(proxy.status(), ProxyStatus::Unchecked);
        assert_eq!(proxy.failure_count(), 0);
        assert_eq!(proxy.dead_since(), None);
        assert_eq!(proxy.backoff_duration(), None);
    }

    #[test]
    fn test_dead_carries_timestamp() {
        let mut proxy = test_proxy();
        let t0 = Instant::now();
        proxy.record_failure();
        proxy.mark_dead(t0, Duration::from_secs(5));
        assert_eq!(proxy.status(), ProxyStatus::Dead);
        assert_eq!(proxy.dead_since(), Some(t0));
        assert_eq!(proxy.backoff_duration(), Some(Duration::from_secs(5)));
        assert!(!proxy.is_expired(t0 + Duration::from_secs(4)));
        assert!(proxy.is_expired(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_revive_keeps_failures() {
        let mut proxy = test_proxy();
        proxy.record_failure();
        proxy.record_failure();
        proxy.mark_dead(Instant::now(), Duration::from_secs(10));
        assert!(proxy.revive());
        assert_eq!(proxy.status(), ProxyStatus::Unchecked);
        assert_eq!(proxy.failure_count(), 2);
        assert_eq!(proxy.dead_since(), None);
        assert!(!proxy.revive());
    }

    #[test]
    fn test_mark_good_resets() {
        let mut proxy = test_proxy();
        proxy.record_failure();
        proxy.mark_dead(Instant::now(), Duration::from_secs(5));
        proxy.mark_good();
        assert_eq!(proxy.status(), ProxyStatus::Good);
        assert_eq!(proxy.failure_count(), 0);
        assert_eq!(proxy.dead_since(), None);
    }

    #[test]
    fn test_status_display_and_eligibility() {
        assert_eq!(ProxyStatus::Dead.to_string(), "DEAD");
        assert!(ProxyStatus::Good.is_eligible());
        assert!(ProxyStatus::Unchecked.is_eligible());
        assert!(!ProxyStatus::Dead.is_eligible());
    }
}
