//! Core proxy pool implementation.

use crate::backoff::{Backoff, ExponentialBackoff};
use crate::config::{DuplicatePolicy, ProxyPoolConfig};
use crate::error::ProxyPoolError;
use crate::proxy::{Proxy, ProxyStatus};
use crate::utils;

use log::{debug, info, warn};
use parking_lot::RwLock;
use rand::seq::IteratorRandom;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Counts of proxies per status, plus the reanimation figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub total: usize,
    pub good: usize,
    pub dead: usize,
    pub unchecked: usize,
    /// Proxies reanimated by the latest sweep.
    pub reanimated: usize,
    pub mean_backoff: Duration,
}

impl PoolStats {
    /// Good plus unchecked.
    pub fn available(&self) -> usize {
        self.good + self.unchecked
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Proxies(good: {}, dead: {}, unchecked: {}, reanimated: {}, mean backoff time: {}s)",
            self.good,
            self.dead,
            self.unchecked,
            self.reanimated,
            self.mean_backoff.as_secs()
        )
    }
}

struct Inner {
    /// Entries keyed by hostport.
    proxies: HashMap<String, Proxy>,
    /// Hostports reanimated by the latest sweep.
    reanimated: Vec<String>,
}

/// A pool of expiring proxies.
///
/// Proxies are `Unchecked` when added, `Good` after a success and `Dead`
/// after a failure. A dead proxy is not handed out until [`reanimate`] finds
/// its backoff elapsed, or until [`reset`]. All state lives behind a single
/// lock; share the pool as `Arc<ProxyPool>`.
///
/// Every operation that takes a proxy accepts either its full address or
/// its `host:port`.
///
/// [`reanimate`]: ProxyPool::reanimate
/// [`reset`]: ProxyPool::reset
pub struct ProxyPool {
    inner: RwLock<Inner>,
    backoff: Box<dyn Backoff>,
    /// Configuration for the pool.
    pub config: ProxyPoolConfig,
}

impl ProxyPool {
    /// Create a pool from the configured proxy list, using exponential backoff
    /// with the configured base and cap.
    pub fn new(config: ProxyPoolConfig) -> Self {
        let backoff = ExponentialBackoff::new(config.backoff_base, config.backoff_cap);
        Self::with_backoff(config, backoff)
    }

    /// Create a pool with a custom backoff policy.
    ///
    /// Malformed or duplicate addresses in the initial list are skipped.
    pub fn with_backoff(config: ProxyPoolConfig, backoff: impl Backoff + 'static) -> Self {
        let pool = Self {
            inner: RwLock::new(Inner {
                proxies: HashMap::with_capacity(config.proxies.len()),
                reanimated: Vec::new(),
            }),
            backoff: Box::new(backoff),
            config,
        };

        let mut skipped = 0;
        for address in &pool.config.proxies {
            if let Err(e) = pool.add(address) {
                warn!("Skipping initial proxy: {}", e);
                skipped += 1;
            }
        }

        info!(
            "Proxy pool created with {} proxies ({} skipped)",
            pool.len(),
            skipped
        );
        pool
    }

    /// Add a proxy in `Unchecked` state.
    pub fn add(&self, address: &str) -> Result<(), ProxyPoolError> {
        let address = address.trim();
        let hostport = utils::extract_hostport(address)
            .ok_or_else(|| ProxyPoolError::MalformedAddress(address.to_string()))?;

        let mut inner = self.inner.write();
        if let Some(existing) = inner.proxies.get_mut(&hostport) {
            return match self.config.duplicate_policy {
                DuplicatePolicy::Reject => Err(ProxyPoolError::Duplicate(hostport)),
                DuplicatePolicy::Overwrite => {
                    debug!("Proxy <{}> address replaced", hostport);
                    existing.set_address(address.to_string());
                    Ok(())
                }
            };
        }

        debug!("Proxy <{}> added", hostport);
        inner
            .proxies
            .insert(hostport.clone(), Proxy::new(address.to_string(), hostport));
        Ok(())
    }

    /// Permanently remove a proxy. Only a new [`add`](ProxyPool::add) brings it back.
    pub fn remove(&self, proxy: &str) -> Result<Proxy, ProxyPoolError> {
        let key = lookup_key(proxy)?;
        let mut inner = self.inner.write();
        let removed = inner
            .proxies
            .remove(&key)
            .ok_or_else(|| ProxyPoolError::NotFound(proxy.to_string()))?;
        inner.reanimated.retain(|hostport| hostport != &key);
        debug!("Proxy <{}> removed", key);
        Ok(removed)
    }

    /// Mark a proxy as good, resetting its failure count.
    pub fn mark_good(&self, proxy: &str) -> Result<(), ProxyPoolError> {
        let key = lookup_key(proxy)?;
        let mut inner = self.inner.write();
        let entry = inner
            .proxies
            .get_mut(&key)
            .ok_or_else(|| ProxyPoolError::NotFound(proxy.to_string()))?;

        if entry.status() != ProxyStatus::Good {
            debug!("Proxy <{}> is GOOD", key);
        }
        entry.mark_good();
        Ok(())
    }

    /// Mark a proxy as dead now.
    pub fn mark_dead(&self, proxy: &str) -> Result<(), ProxyPoolError> {
        self.mark_dead_at(proxy, Instant::now())
    }

    /// Mark a proxy as dead at `at`.
    ///
    /// Marking an already dead proxy counts as another failure: the backoff
    /// grows and restarts from `at`.
    pub fn mark_dead_at(&self, proxy: &str, at: Instant) -> Result<(), ProxyPoolError> {
        let key = lookup_key(proxy)?;
        let mut inner = self.inner.write();
        let entry = inner
            .proxies
            .get_mut(&key)
            .ok_or_else(|| ProxyPoolError::NotFound(proxy.to_string()))?;

        let failures = entry.record_failure();
        let backoff = self.backoff.duration(failures);
        entry.mark_dead(at, backoff);
        debug!(
            "Proxy <{}> is DEAD (failures: {}, backoff: {:?})",
            key, failures, backoff
        );
        Ok(())
    }

    /// Return the full address for the hostport of `proxy`, if it is in the pool.
    pub fn get_proxy(&self, proxy: &str) -> Option<String> {
        let key = utils::extract_hostport(proxy)?;
        self.inner
            .read()
            .proxies
            .get(&key)
            .map(|entry| entry.address().to_string())
    }

    /// Snapshot of the entry for `proxy`.
    pub fn entry(&self, proxy: &str) -> Option<Proxy> {
        let key = utils::extract_hostport(proxy)?;
        self.inner.read().proxies.get(&key).cloned()
    }

    /// Return the address of a random good or unchecked proxy.
    pub fn get_random(&self) -> Option<String> {
        let inner = self.inner.read();
        inner
            .proxies
            .values()
            .filter(|entry| entry.status().is_eligible())
            .choose(&mut rand::rng())
            .map(|entry| entry.address().to_string())
    }

    /// Move dead proxies whose backoff has elapsed to `Unchecked`.
    pub fn reanimate(&self) -> Vec<String> {
        self.reanimate_at(Instant::now())
    }

    /// Move proxies dead for at least their backoff at `at` to `Unchecked`.
    ///
    /// Failure counts are kept, so the next failure backs off longer. Returns
    /// the hostports that were reanimated, also available from
    /// [`reanimated`](ProxyPool::reanimated) until the next sweep.
    pub fn reanimate_at(&self, at: Instant) -> Vec<String> {
        let mut inner = self.inner.write();
        let mut reanimated = Vec::new();
        for (hostport, entry) in inner.proxies.iter_mut() {
            if entry.is_expired(at) && entry.revive() {
                reanimated.push(hostport.clone());
            }
        }

        if !reanimated.is_empty() {
            info!("Reanimated {} proxies: {:?}", reanimated.len(), reanimated);
        }
        inner.reanimated = reanimated.clone();
        reanimated
    }

    /// Hostports reanimated by the latest sweep.
    pub fn reanimated(&self) -> Vec<String> {
        self.inner.read().reanimated.clone()
    }

    /// Move every dead proxy to `Unchecked` immediately. Returns how many moved.
    pub fn reset(&self) -> usize {
        let mut inner = self.inner.write();
        let count = inner
            .proxies
            .values_mut()
            .map(Proxy::revive)
            .filter(|revived| *revived)
            .count();
        info!("Reset {} dead proxies to UNCHECKED", count);
        count
    }

    /// Mean backoff of the dead proxies, zero when none is dead.
    pub fn mean_backoff_time(&self) -> Duration {
        mean_backoff(&self.inner.read().proxies)
    }

    /// Number of proxies in the pool.
    pub fn len(&self) -> usize {
        self.inner.read().proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().proxies.is_empty()
    }

    /// Get statistics about the proxy pool.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.read();
        let mut stats = PoolStats {
            total: inner.proxies.len(),
            reanimated: inner.reanimated.len(),
            mean_backoff: mean_backoff(&inner.proxies),
            ..PoolStats::default()
        };
        for entry in inner.proxies.values() {
            match entry.status() {
                ProxyStatus::Good => stats.good += 1,
                ProxyStatus::Dead => stats.dead += 1,
                ProxyStatus::Unchecked => stats.unchecked += 1,
            }
        }
        stats
    }
}

impl fmt::Display for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.stats().fmt(f)
    }
}

impl fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPool")
            .field("stats", &self.stats())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lookup_key(proxy: &str) -> Result<String, ProxyPoolError> {
    utils::extract_hostport(proxy).ok_or_else(|| ProxyPoolError::NotFound(proxy.to_string()))
}

fn mean_backoff(proxies: &HashMap<String, Proxy>) -> Duration {
    // u128 nanoseconds cannot overflow for any realistic pool size
    let (total_nanos, count) = proxies
        .values()
        .filter_map(Proxy::backoff_duration)
        .fold((0u128, 0u128), |(total, count), backoff| {
            (total.saturating_add(backoff.as_nanos()), count + 1)
        });
    if count == 0 {
        return Duration::ZERO;
    }
    // the mean never exceeds the largest backoff, so it fits a Duration
    let mean = total_nanos / count;
    Duration::new(
        (mean / NANOS_PER_SEC) as u64,
        (mean % NANOS_PER_SEC) as u32,
    )
}

const NANOS_PER_SEC: u128 = 1_000_000_000;
