//! The part of the gateway a collection needs to hydrate its elements.

use std::sync::{Arc, Mutex};

use datagate_core::{
    Error, HydrationError, HydrationErrorKind, Object, Result, Row, TypeKey,
};

use crate::config::CachePolicy;
use crate::identity_map::IdentityMap;
use crate::lock;
use crate::registry::{RegisteredType, TypeRegistry};

/// Resolves rows to domain objects for a [`Collection`](crate::Collection).
pub trait ObjectSource: Send + Sync {
    fn type_is_registered(&self, class: &TypeKey) -> bool;

    /// The canonical object for `row`, building it on first sight.
    #[allow(clippy::result_large_err)]
    fn get_object(&self, class: &TypeKey, row: &Row) -> Result<Object>;
}

/// Registered types plus the identity map that guarantees one object per
/// identity key.
#[derive(Debug)]
pub struct IdentityScope {
    registry: TypeRegistry,
    identity: Mutex<IdentityMap>,
}

impl IdentityScope {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            registry: TypeRegistry::new(),
            identity: Mutex::new(IdentityMap::new(policy)),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Register a type and open its identity bucket.
    #[allow(clippy::result_large_err)]
    pub fn register(&self, ty: RegisteredType) -> Result<Arc<RegisteredType>> {
        let ty = self.registry.register(ty)?;
        lock(&self.identity).add_bucket(ty.key());
        Ok(ty)
    }

    /// An already hydrated object for `row`, without building one.
    ///
    /// Rows whose key fields cannot be read have no known object; the
    /// failure surfaces when they are hydrated.
    pub fn known_object(&self, class: &TypeKey, row: &Row) -> Option<Object> {
        let ty = self.registry.get(class).ok()?;
        let key = ty.identity_key(row).ok()?;
        lock(&self.identity).peek(class, &key).cloned()
    }

    /// Resolve `row` through the identity map, building the object with the
    /// type's factory on a miss.
    #[tracing::instrument(level = "trace", skip_all, fields(class = class.name()))]
    #[allow(clippy::result_large_err)]
    pub fn hydrate(&self, class: &TypeKey, row: &Row) -> Result<Object> {
        let ty = self.registry.get(class)?;
        let key = ty.identity_key(row)?;
        if let Some(existing) = lock(&self.identity).get(class, &key) {
            tracing::trace!(key = %key, "Identity map hit");
            return Ok(existing);
        }

        let object = ty.factory().build(row)?;
        if object.type_key() != *class {
            return Err(Error::Hydration(HydrationError {
                kind: HydrationErrorKind::WrongType,
                expected: class.name().to_string(),
                actual: object.type_name().to_string(),
            }));
        }
        tracing::trace!(key = %key, "Built new object");
        Ok(lock(&self.identity).get_or_insert(*class, key, row.clone(), object))
    }

    /// Point the identity entry for `row`'s key at `object`.
    #[allow(clippy::result_large_err)]
    pub fn remember(&self, class: &TypeKey, row: Row, object: Object) -> Result<()> {
        let ty = self.registry.get(class)?;
        let key = ty.identity_key(&row)?;
        lock(&self.identity).insert(*class, key, row, object);
        Ok(())
    }

    /// The raw row stored for `row`'s identity key, if any.
    pub fn cached_row(&self, class: &TypeKey, row: &Row) -> Option<Row> {
        let ty = self.registry.get(class).ok()?;
        let key = ty.identity_key(row).ok()?;
        lock(&self.identity).row(class, &key).cloned()
    }

    /// Number of identity entries across all types.
    pub fn identity_len(&self) -> usize {
        lock(&self.identity).len()
    }
}

impl Default for IdentityScope {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl ObjectSource for IdentityScope {
    fn type_is_registered(&self, class: &TypeKey) -> bool {
        self.registry.contains(class)
    }

    fn get_object(&self, class: &TypeKey, row: &Row) -> Result<Object> {
        self.hydrate(class, row)
    }
}
