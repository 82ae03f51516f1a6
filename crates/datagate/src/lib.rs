//! datagate - a gateway data mapper for Rust.
//!
//! datagate maps rows returned by a backend [`Connection`] to domain objects
//! and back, providing:
//!
//! - An identity map: the same row always resolves to the same object
//! - Memoized reads: a template and parameter set reach the backend once
//! - Lazy, read-only collections for multi-row results
//! - Upsert and delete with statement shape checks
//!
//! # Quick Start
//!
//! ```ignore
//! use datagate::prelude::*;
//!
//! #[derive(Debug)]
//! struct Hero {
//!     id: i64,
//!     name: String,
//! }
//!
//! let factory = FnFactory::new(
//!     |row| Ok(Hero { id: row.get_named("id")?, name: row.get_named("name")? }),
//!     |hero: &Hero| Ok(Row::from_pairs([("id", Value::from(hero.id)), ("name", Value::from(hero.name.as_str()))])),
//! );
//! let provider = TableQueryProvider::for_type::<Hero>("heroes")
//!     .single("byName", "SELECT * FROM heroes WHERE name = :name");
//!
//! let gateway = GatewayBuilder::new().build_with(connection);
//! gateway.add_type::<Hero>(factory, provider, DEFAULT_KEY_FIELDS)?;
//!
//! // Fetch by key; repeated fetches return the same Arc
//! let hero = gateway.fetch::<Hero>(&[Value::from(1)])?;
//!
//! // Named query
//! let spidey = gateway.fetch_by::<Hero>("byName", &[Value::from("Spider-Man")])?;
//!
//! // All rows, hydrated on access
//! let heroes = gateway.fetch_all::<Hero>(&[])?;
//! for hero in heroes.iter() {
//!     println!("{:?}", hero?.downcast_ref::<Hero>());
//! }
//!
//! // Write back
//! gateway.save(&Object::new(Hero { id: 2, name: "Storm".into() }), &[])?;
//! ```

pub use datagate_core::{
    BindingError, CollectionError, CollectionErrorKind, Connection, ConnectionError,
    ConnectionErrorKind, Error, Factory, FnFactory, FromValue, HydrationError, HydrationErrorKind,
    IdentityKey, KeyValue, LookupError, LookupErrorKind, Marker, NotFoundError, Object, ParamKey,
    Params, QueryKey, QueryProvider, RegistrationError, RegistrationErrorKind,
    Related, Result, Row, StatementError, StatementErrorKind, TableQueryProvider, Template,
    TemplateMap, TypeError, TypeKey, Value,
};

pub use datagate_gateway::{
    CachePolicy, Cardinality, Collection, CollectionFactory, DEFAULT_KEY_FIELDS,
    DefaultCollectionFactory, Fetched, Gateway, GatewayConfig, GatewayStats, IdentityScope,
    ObjectSource,
};

pub mod builder;
pub use builder::GatewayBuilder;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use datagate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CachePolicy,
        Collection,
        // Collaborator contracts
        Connection,
        DEFAULT_KEY_FIELDS,
        DefaultCollectionFactory,
        Error,
        Factory,
        Fetched,
        FnFactory,
        // Gateway
        Gateway,
        GatewayBuilder,
        GatewayConfig,
        Object,
        Params,
        QueryKey,
        QueryProvider,
        Related,
        Result,
        Row,
        TableQueryProvider,
        TypeKey,
        Value,
    };
}
