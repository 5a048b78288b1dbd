//! Periodic reanimation of dead proxies.

use crate::pool::ProxyPool;

use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Background task calling [`ProxyPool::reanimate`] on a fixed interval.
///
/// The task stops when this handle is dropped or [`stop`](Reanimator::stop)ped.
/// Must be spawned inside a tokio runtime.
#[derive(Debug)]
pub struct Reanimator {
    handle: JoinHandle<()>,
}

impl Reanimator {
    /// Start sweeping `pool` every `interval`.
    pub fn spawn(pool: Arc<ProxyPool>, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reanimated = pool.reanimate();
                if !reanimated.is_empty() {
                    info!("Proxy pool status update: {}", pool);
                } else {
                    debug!("Proxy pool status update: {}", pool);
                }
            }
        });
        info!("Reanimating dead proxies every {:?}", interval);
        Self { handle }
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the task.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Reanimator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyPoolConfig;
    use crate::proxy::ProxyStatus;

    fn pool() -> Arc<ProxyPool> {
        let config = ProxyPoolConfig::builder()
            .proxies(vec!["1.2.3.4:8000"])
            .backoff_base(Duration::from_millis(20))
            .build();
        Arc::new(ProxyPool::new(config))
    }

    #[tokio::test]
    async fn test_reanimates_after_backoff() {
        let pool = pool();
        pool.mark_dead("1.2.3.4:8000").unwrap();
        let reanimator = Reanimator::spawn(Arc::clone(&pool), Duration::from_millis(10));
        assert!(reanimator.is_running());

        time::sleep(Duration::from_millis(200)).await;
        let entry = pool.entry("1.2.3.4:8000").unwrap();
        assert_eq!(entry.status(), ProxyStatus::Unchecked);
        assert_eq!(entry.failure_count(), 1);
        reanimator.stop();
    }

    #[tokio::test]
    async fn test_stop_ends_sweeps() {
        let pool = pool();
        let reanimator = Reanimator::spawn(Arc::clone(&pool), Duration::from_millis(10));
        reanimator.stop();
        time::sleep(Duration::from_millis(20)).await;

        pool.mark_dead("1.2.3.4:8000").unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.entry("1.2.3.4:8000").unwrap().status(), ProxyStatus::Dead);
    }
}
