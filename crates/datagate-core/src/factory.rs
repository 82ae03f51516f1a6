//! Object construction strategy.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::error::{Error, HydrationError, HydrationErrorKind, LookupError, LookupErrorKind};
use crate::object::{Object, TypeKey};
use crate::row::Row;

/// Objects reachable from a saved object through a named accessor.
#[derive(Debug, Clone)]
pub enum Related {
    /// Nothing to save
    None,
    One(Object),
    Many(Vec<Object>),
}

impl Related {
    /// Flatten into the list of objects to save.
    pub fn into_objects(self) -> Vec<Object> {
        match self {
            Related::None => Vec::new(),
            Related::One(obj) => vec![obj],
            Related::Many(objs) => objs,
        }
    }
}

/// Builds domain objects from rows and takes them apart again.
///
/// One factory is registered per domain type. `dismantle` must produce a
/// flat row of scalars; the gateway binds it directly to the upsert
/// statement.
pub trait Factory: Send + Sync {
    /// Does this factory know how to build `class`?
    fn approve_class(&self, class: &TypeKey) -> bool;

    /// Build a domain object from a raw row.
    #[allow(clippy::result_large_err)]
    fn build(&self, row: &Row) -> Result<Object>;

    /// Flatten a domain object into a raw row.
    #[allow(clippy::result_large_err)]
    fn dismantle(&self, object: &Object) -> Result<Row>;

    /// Resolve a related-object accessor, used by nested saves.
    #[allow(clippy::result_large_err)]
    fn related(&self, object: &Object, accessor: &str) -> Result<Related> {
        Err(Error::Lookup(LookupError {
            kind: LookupErrorKind::UnknownAccessor,
            type_name: Some(object.type_name().to_string()),
            name: accessor.to_string(),
            message: "factory has no related-object accessors".to_string(),
        }))
    }
}

impl<F: Factory + ?Sized> Factory for Arc<F> {
    fn approve_class(&self, class: &TypeKey) -> bool {
        (**self).approve_class(class)
    }

    fn build(&self, row: &Row) -> Result<Object> {
        (**self).build(row)
    }

    fn dismantle(&self, object: &Object) -> Result<Row> {
        (**self).dismantle(object)
    }

    fn related(&self, object: &Object, accessor: &str) -> Result<Related> {
        (**self).related(object, accessor)
    }
}

type BuildFn<T> = dyn Fn(&Row) -> Result<T> + Send + Sync;
type DismantleFn<T> = dyn Fn(&T) -> Result<Row> + Send + Sync;
type RelatedFn<T> = dyn Fn(&T) -> Related + Send + Sync;

/// A [`Factory`] for a single type `T`, assembled from closures.
///
/// ```ignore
/// let factory = FnFactory::new(
///     |row| Ok(User { id: row.get_named("id")?, name: row.get_named("name")? }),
///     |user: &User| Ok(Row::from_pairs([("id", Value::from(user.id)), ("name", user.name.as_str().into())])),
/// )
/// .with_related("friends", |user: &User| Related::Many(user.friends.clone()));
/// ```
pub struct FnFactory<T> {
    build: Box<BuildFn<T>>,
    dismantle: Box<DismantleFn<T>>,
    related: Vec<(String, Box<RelatedFn<T>>)>,
}

impl<T: Any + Send + Sync> FnFactory<T> {
    pub fn new<B, D>(build: B, dismantle: D) -> Self
    where
        B: Fn(&Row) -> Result<T> + Send + Sync + 'static,
        D: Fn(&T) -> Result<Row> + Send + Sync + 'static,
    {
        Self {
            build: Box::new(build),
            dismantle: Box::new(dismantle),
            related: Vec::new(),
        }
    }

    /// Register a named accessor for nested saves.
    pub fn with_related<F>(mut self, accessor: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T) -> Related + Send + Sync + 'static,
    {
        self.related.push((accessor.into(), Box::new(f)));
        self
    }

    #[allow(clippy::result_large_err)]
    fn expect_own<'a>(&self, object: &'a Object) -> Result<&'a T> {
        object.downcast_ref::<T>().ok_or_else(|| {
            Error::Hydration(HydrationError {
                kind: HydrationErrorKind::WrongType,
                expected: std::any::type_name::<T>().to_string(),
                actual: object.type_name().to_string(),
            })
        })
    }
}

impl<T: Any + Send + Sync> Factory for FnFactory<T> {
    fn approve_class(&self, class: &TypeKey) -> bool {
        *class == TypeKey::of::<T>()
    }

    fn build(&self, row: &Row) -> Result<Object> {
        (self.build)(row).map(|value| Object::from_arc(Arc::new(value)))
    }

    fn dismantle(&self, object: &Object) -> Result<Row> {
        let value = self.expect_own(object)?;
        (self.dismantle)(value)
    }

    fn related(&self, object: &Object, accessor: &str) -> Result<Related> {
        let value = self.expect_own(object)?;
        match self.related.iter().find(|(name, _)| name == accessor) {
            Some((_, f)) => Ok(f(value)),
            None => Err(Error::Lookup(LookupError {
                kind: LookupErrorKind::UnknownAccessor,
                type_name: Some(object.type_name().to_string()),
                name: accessor.to_string(),
                message: "no related-object accessor registered".to_string(),
            })),
        }
    }
}

impl<T> fmt::Debug for FnFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("type", &std::any::type_name::<T>())
            .field(
                "related",
                &self.related.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
