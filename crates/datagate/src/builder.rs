//! Fluent construction of a [`Gateway`].
//!
//! # Example
//!
//! ```rust,ignore
//! use datagate::prelude::*;
//!
//! let gateway = GatewayBuilder::new()
//!     .query_cache(CachePolicy::lru(1024))
//!     .build_with(connection);
//! ```

use std::fmt;
use std::sync::Arc;

use datagate_core::Connection;
use datagate_gateway::{
    CachePolicy, CollectionFactory, DefaultCollectionFactory, Gateway, GatewayConfig,
};

/// Builder for [`Gateway`] instances.
///
/// Without further settings the built gateway uses
/// [`DefaultCollectionFactory`] and never evicts cached entries.
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    collections: Option<Arc<dyn CollectionFactory>>,
}

impl GatewayBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration, e.g. one deserialized from the
    /// application's settings.
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the eviction policy for memoized query results.
    #[must_use]
    pub fn query_cache(mut self, policy: CachePolicy) -> Self {
        self.config = self.config.query_cache(policy);
        self
    }

    /// Set the eviction policy for identity map entries.
    #[must_use]
    pub fn identity_cache(mut self, policy: CachePolicy) -> Self {
        self.config = self.config.identity_cache(policy);
        self
    }

    /// Use a custom factory for multi-row results.
    #[must_use]
    pub fn collection_factory(mut self, factory: impl CollectionFactory + 'static) -> Self {
        self.collections = Some(Arc::new(factory));
        self
    }

    /// Build the gateway around `connection`.
    pub fn build_with<C: Connection>(self, connection: C) -> Gateway<C> {
        let collections = self
            .collections
            .unwrap_or_else(|| Arc::new(DefaultCollectionFactory));
        tracing::debug!(config = ?self.config, "Building gateway");
        Gateway::with_config(connection, collections, self.config)
    }
}

impl fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("config", &self.config)
            .field("custom_collections", &self.collections.is_some())
            .finish()
    }
}
