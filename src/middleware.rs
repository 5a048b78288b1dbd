//! Middleware implementation for reqwest.

use crate::config::ProxyPoolConfig;
use crate::error::NoProxyAvailable;
use crate::pool::ProxyPool;
use crate::reanimator::Reanimator;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::sync::Arc;

/// Decides whether an outcome means the proxy is dead.
pub trait BanDetectionPolicy: Send + Sync {
    /// Whether `response` shows the proxy is banned or broken.
    fn response_is_ban(&self, response: &reqwest::Response) -> bool;

    /// Whether a transport error should count against the proxy.
    fn error_is_ban(&self, _error: &reqwest::Error) -> bool {
        true
    }
}

/// Bans on any status other than 200, 301 and 302, and on every error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBanPolicy;

impl BanDetectionPolicy for DefaultBanPolicy {
    fn response_is_ban(&self, response: &reqwest::Response) -> bool {
        !matches!(
            response.status(),
            StatusCode::OK | StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND
        )
    }
}

/// Middleware that sends each request through a random proxy of the pool,
/// marking proxies good or dead from the outcome.
#[derive(Clone)]
pub struct RotatingProxyMiddleware {
    /// The proxy pool.
    pool: Arc<ProxyPool>,
    ban_policy: Arc<dyn BanDetectionPolicy>,
    /// Kept alive for as long as any clone of the middleware.
    _reanimator: Option<Arc<Reanimator>>,
}

impl RotatingProxyMiddleware {
    /// Create the pool from `config` and start reanimating it every
    /// `config.reanimate_interval`.
    pub async fn new(config: ProxyPoolConfig) -> Self {
        let pool = Arc::new(ProxyPool::new(config));
        let reanimator = Reanimator::spawn(Arc::clone(&pool), pool.config.reanimate_interval);

        let stats = pool.stats();
        info!(
            "Proxy pool initialized with {}/{} available proxies",
            stats.available(),
            stats.total
        );
        if stats.available() == 0 {
            warn!("No available proxies in pool");
        }

        Self {
            pool,
            ban_policy: Arc::new(DefaultBanPolicy),
            _reanimator: Some(Arc::new(reanimator)),
        }
    }

    /// Use an existing pool. Reanimation is left to the caller.
    pub fn from_pool(pool: Arc<ProxyPool>) -> Self {
        Self {
            pool,
            ban_policy: Arc::new(DefaultBanPolicy),
            _reanimator: None,
        }
    }

    /// Replace the ban detection policy.
    pub fn with_ban_policy(mut self, policy: impl BanDetectionPolicy + 'static) -> Self {
        self.ban_policy = Arc::new(policy);
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    fn select_proxy(&self) -> Result<String> {
        if let Some(proxy) = self.pool.get_random() {
            return Ok(proxy);
        }

        if self.pool.config.stop_if_no_proxies {
            warn!("No proxy available. {}", self.pool);
            return Err(Error::Middleware(anyhow!(NoProxyAvailable)));
        }

        warn!("No proxies available; marking all proxies as unchecked");
        self.pool.reset();
        self.pool.get_random().ok_or_else(|| {
            error!("No proxies available even after a reset");
            Error::Middleware(anyhow!(NoProxyAvailable))
        })
    }

    fn build_client(&self, proxy_url: &str) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy_url)?)
            .timeout(self.pool.config.request_timeout)
            .build()
    }

    fn report_good(&self, proxy_url: &str) {
        if let Err(e) = self.pool.mark_good(proxy_url) {
            debug!("Not marking {} good: {}", proxy_url, e);
        }
    }

    fn report_dead(&self, proxy_url: &str) {
        if let Err(e) = self.pool.mark_dead(proxy_url) {
            debug!("Not marking {} dead: {}", proxy_url, e);
        }
    }
}

#[async_trait]
impl Middleware for RotatingProxyMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let max_attempts = self.pool.config.max_proxies_to_try.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let proxy_url = self.select_proxy()?;
            let proxied_request = req.try_clone().ok_or_else(|| {
                Error::Middleware(anyhow!(
                    "Request object is not cloneable. Are you passing a streaming body?"
                ))
            })?;
            info!("Using proxy: {} (attempt {})", proxy_url, attempt);

            let client = match self.build_client(&proxy_url) {
                Ok(client) => client,
                Err(e) => {
                    warn!("Failed to build client with proxy {}: {}", proxy_url, e);
                    self.report_dead(&proxy_url);
                    if attempt >= max_attempts {
                        return Err(Error::Reqwest(e));
                    }
                    continue;
                }
            };

            match client.execute(proxied_request).await {
                Ok(response) if self.ban_policy.response_is_ban(&response) => {
                    warn!(
                        "Proxy {} banned with status {} (attempt {})",
                        proxy_url,
                        response.status(),
                        attempt
                    );
                    self.report_dead(&proxy_url);
                    if attempt >= max_attempts {
                        info!("Gave up retrying {} after {} proxies", req.url(), attempt);
                        return Ok(response);
                    }
                }
                Ok(response) => {
                    self.report_good(&proxy_url);
                    return Ok(response);
                }
                Err(err) => {
                    warn!(
                        "Request failed with proxy {} (attempt {}): {}",
                        proxy_url, attempt, err
                    );
                    if !self.ban_policy.error_is_ban(&err) {
                        return Err(Error::Reqwest(err));
                    }
                    self.report_dead(&proxy_url);
                    if attempt >= max_attempts {
                        return Err(Error::Reqwest(err));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyStatus;
    use reqwest_middleware::ClientBuilder;
    use std::time::Duration;

    fn response(status: u16) -> reqwest::Response {
        reqwest::Response::from(
            http::Response::builder()
                .status(status)
                .body("body")
                .unwrap(),
        )
    }

    fn pool(proxies: Vec<&str>, max_attempts: usize, stop: bool) -> Arc<ProxyPool> {
        let config = ProxyPoolConfig::builder()
            .proxies(proxies)
            .max_proxies_to_try(max_attempts)
            .stop_if_no_proxies(stop)
            .request_timeout(Duration::from_secs(2))
            .build();
        Arc::new(ProxyPool::new(config))
    }

    #[test]
    fn test_default_ban_policy() {
        let policy = DefaultBanPolicy;
        assert!(!policy.response_is_ban(&response(200)));
        assert!(!policy.response_is_ban(&response(301)));
        assert!(!policy.response_is_ban(&response(302)));
        assert!(policy.response_is_ban(&response(403)));
        assert!(policy.response_is_ban(&response(503)));
    }

    #[tokio::test]
    async fn test_empty_pool_fails_fast() {
        let middleware = RotatingProxyMiddleware::from_pool(pool(vec![], 3, true));
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(middleware)
            .build();

        let err = client.get("http://127.0.0.1:9/").send().await.unwrap_err();
        assert!(matches!(err, Error::Middleware(_)));
    }

    #[tokio::test]
    async fn test_unreachable_proxy_marked_dead() {
        let pool = pool(vec!["http://127.0.0.1:1"], 1, true);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RotatingProxyMiddleware::from_pool(Arc::clone(&pool)))
            .build();

        let err = client.get("http://example.invalid/").send().await.unwrap_err();
        assert!(matches!(err, Error::Reqwest(_)));

        let entry = pool.entry("127.0.0.1:1").unwrap();
        assert_eq!(entry.status(), ProxyStatus::Dead);
        assert_eq!(entry.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_pool_resets_when_allowed() {
        let pool = pool(vec!["http://127.0.0.1:1"], 1, false);
        pool.mark_dead("127.0.0.1:1").unwrap();
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RotatingProxyMiddleware::from_pool(Arc::clone(&pool)))
            .build();

        assert!(client.get("http://example.invalid/").send().await.is_err());
        // reset made it eligible again, then it failed a second time
        assert_eq!(pool.entry("127.0.0.1:1").unwrap().failure_count(), 2);
    }

    #[tokio::test]
    async fn test_new_keeps_reanimating() {
        let config = ProxyPoolConfig::builder()
            .proxies(vec!["1.2.3.4:8000"])
            .backoff_base(Duration::from_millis(10))
            .reanimate_interval(Duration::from_millis(10))
            .build();
        let middleware = RotatingProxyMiddleware::new(config).await;
        middleware.pool().mark_dead("1.2.3.4:8000").unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            middleware.pool().entry("1.2.3.4:8000").unwrap().status(),
            ProxyStatus::Unchecked
        );
    }
}
