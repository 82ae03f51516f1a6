//! Gateway data mapper for datagate.
//!
//! `datagate-gateway` sits between domain code and a [`Connection`]. Domain
//! types are registered with a [`Factory`] that converts between rows and
//! objects and a [`QueryProvider`] that supplies the statement templates.
//!
//! # Role In The Architecture
//!
//! - **Identity map**: one object per (type, identity key), for the lifetime
//!   of the gateway.
//! - **Query memoization**: a (template, parameters) pair reaches the
//!   connection at most once; later reads are answered from memory.
//! - **Lazy collections**: multi-row fetches return a read-only
//!   [`Collection`] that builds each element on first access.
//! - **Writes**: `save` upserts and refreshes the identity map; `delete`
//!   removes by key. Neither is memoized.
//!
//! # Example
//!
//! ```ignore
//! let gateway = Gateway::new(conn, Arc::new(DefaultCollectionFactory));
//! gateway.add_type::<User>(user_factory, TableQueryProvider::for_type::<User>("users"), DEFAULT_KEY_FIELDS)?;
//!
//! let user = gateway.fetch::<User>(&[Value::from(1)])?;
//! let again = gateway.fetch::<User>(&[Value::from(1)])?;
//! assert!(Arc::ptr_eq(&user, &again));
//!
//! for user in gateway.fetch_all::<User>(&[])?.iter() {
//!     println!("{:?}", user?.downcast_ref::<User>());
//! }
//! ```
//!
//! [`Connection`]: datagate_core::Connection
//! [`Factory`]: datagate_core::Factory
//! [`QueryProvider`]: datagate_core::QueryProvider

pub mod collection;
pub mod config;
pub mod gateway;
pub mod identity_map;
pub mod query_cache;
pub mod registry;
pub mod source;

pub use collection::{Collection, CollectionFactory, DefaultCollectionFactory, Iter};
pub use config::{CachePolicy, GatewayConfig};
pub use gateway::{Fetched, Gateway, GatewayStats};
pub use identity_map::IdentityMap;
pub use query_cache::QueryCache;
pub use registry::{Cardinality, DEFAULT_KEY_FIELDS, QueryDef, QueryMap, RegisteredType, TypeRegistry};
pub use source::{IdentityScope, ObjectSource};

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered poisoned gateway lock");
        poisoned.into_inner()
    })
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered poisoned registry lock");
        poisoned.into_inner()
    })
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered poisoned registry lock");
        poisoned.into_inner()
    })
}
