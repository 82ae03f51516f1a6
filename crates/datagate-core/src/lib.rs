//! Core types and contracts for datagate.
//!
//! This crate provides the pieces shared by the gateway and by the code
//! that plugs into it:
//!
//! - `Value` and `Row` for the field/value data exchanged with a backend
//! - `Connection`, `Factory` and `QueryProvider` collaborator traits
//! - `Object` and `TypeKey` for type-erased domain objects
//! - `Template`, `QueryKey` and canonical keys used for caching
//! - the crate-wide `Error`

pub mod connection;
pub mod error;
pub mod factory;
pub mod key;
pub mod object;
pub mod provider;
pub mod query;
pub mod row;
pub mod template;
pub mod value;

pub use connection::{Connection, Params};
pub use error::{
    BindingError, CollectionError, CollectionErrorKind, ConnectionError, ConnectionErrorKind,
    Error, HydrationError, HydrationErrorKind, LookupError, LookupErrorKind, NotFoundError,
    RegistrationError, RegistrationErrorKind, Result, StatementError, StatementErrorKind,
    TypeError,
};
pub use factory::{Factory, FnFactory, Related};
pub use key::{IdentityKey, KeyValue, ParamKey};
pub use object::{Object, TypeKey};
pub use provider::{QueryProvider, TableQueryProvider, TemplateMap};
pub use query::QueryKey;
pub use row::{FromValue, Row};
pub use template::{Marker, Template};
pub use value::Value;
