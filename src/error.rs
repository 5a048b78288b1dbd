//! Error types for the rotating-proxy-pool crate.

use thiserror::Error;

/// Errors returned by the mutating operations of [`ProxyPool`](crate::ProxyPool).
///
/// A failed operation never leaves a partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyPoolError {
    /// The address or hostport is not in the pool (never added, or removed).
    #[error("Proxy not found: {0}")]
    NotFound(String),

    /// The address has no parseable host and port.
    #[error("Malformed proxy address: {0:?}")]
    MalformedAddress(String),

    /// Another entry already uses this hostport.
    #[error("Duplicate proxy: {0}")]
    Duplicate(String),
}

/// Error returned when no good or unchecked proxy is available in the pool.
#[derive(Debug, Error)]
#[error("No proxy available in pool")]
pub struct NoProxyAvailable;
