//! # rotating-proxy-pool
//!
//! An expiring proxy pool for crawlers.
//!
//! Proxies start out unchecked, become good when a request through them
//! succeeds and dead when one fails. Dead proxies are skipped until an
//! exponentially growing backoff has passed, after which a reanimation sweep
//! puts them back into rotation. A reqwest middleware is provided to drive the
//! pool from an HTTP client.

pub mod backoff;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod reanimator;
pub mod utils;

pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff};
pub use config::{DuplicatePolicy, ProxyPoolConfig, ProxyPoolConfigBuilder};
pub use error::{NoProxyAvailable, ProxyPoolError};
pub use middleware::{BanDetectionPolicy, DefaultBanPolicy, RotatingProxyMiddleware};
pub use pool::{PoolStats, ProxyPool};
pub use proxy::{Proxy, ProxyStatus};
pub use reanimator::Reanimator;
