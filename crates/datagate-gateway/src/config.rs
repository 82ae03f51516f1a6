//! Gateway configuration.

use serde::{Deserialize, Serialize};

/// How long cached entries are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachePolicy {
    /// Keep every entry for the lifetime of the gateway
    #[default]
    Unbounded,
    /// Keep at most `capacity` entries, evicting the least recently used
    Lru { capacity: usize },
}

impl CachePolicy {
    pub const fn lru(capacity: usize) -> Self {
        CachePolicy::Lru { capacity }
    }

    /// Maximum number of entries, if bounded. A zero capacity is treated as one.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            CachePolicy::Unbounded => None,
            CachePolicy::Lru { capacity } => Some((*capacity).max(1)),
        }
    }
}

/// Gateway configuration.
///
/// The defaults never evict anything, which suits short-lived gateways
/// (one per request). Long-running processes sharing a gateway should bound
/// the caches.
///
/// ```
/// use datagate_gateway::{CachePolicy, GatewayConfig};
///
/// let config = GatewayConfig::new()
///     .query_cache(CachePolicy::lru(1024))
///     .identity_cache(CachePolicy::lru(10_000));
/// assert_eq!(config.query_cache.capacity(), Some(1024));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Memoized query results, counted across all templates
    pub query_cache: CachePolicy,
    /// Identity-map entries, counted per registered type
    pub identity_cache: CachePolicy,
}

impl GatewayConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query result cache policy.
    #[must_use]
    pub fn query_cache(mut self, policy: CachePolicy) -> Self {
        self.query_cache = policy;
        self
    }

    /// Set the identity map policy.
    #[must_use]
    pub fn identity_cache(mut self, policy: CachePolicy) -> Self {
        self.identity_cache = policy;
        self
    }
}
