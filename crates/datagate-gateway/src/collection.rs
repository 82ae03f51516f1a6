//! Read-only, lazily hydrated result collections.
//!
//! A [`Collection`] is created from the raw rows of a multi-row fetch. Rows
//! are held eagerly; each element is turned into a domain object only when
//! it is first read, through the [`ObjectSource`] the collection was created
//! with. Elements already present in the identity map are seeded at
//! construction so reading them never calls a factory.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use datagate_core::{
    CollectionError, CollectionErrorKind, Error, HydrationError, HydrationErrorKind, Object,
    Result, Row, TypeKey,
};

use crate::source::ObjectSource;

/// An ordered, immutable sequence of domain objects of one type.
pub struct Collection {
    source: Arc<dyn ObjectSource>,
    class: TypeKey,
    rows: Vec<Row>,
    /// One slot per row; a filled slot never changes
    objects: Vec<OnceLock<Object>>,
}

impl Collection {
    /// Create a collection over `rows`.
    ///
    /// `known` seeds already hydrated objects; when given it must have one
    /// entry per row, and every present entry must be exactly `class`.
    #[allow(clippy::result_large_err)]
    pub fn new(
        source: Arc<dyn ObjectSource>,
        class: TypeKey,
        rows: Vec<Row>,
        known: Option<Vec<Option<Object>>>,
    ) -> Result<Self> {
        if !source.type_is_registered(&class) {
            return Err(Error::not_registered(class.name()));
        }

        let objects = match known {
            None => rows.iter().map(|_| OnceLock::new()).collect(),
            Some(known) => {
                if known.len() != rows.len() {
                    return Err(collection_error(
                        CollectionErrorKind::LengthMismatch,
                        None,
                        format!(
                            "{} known objects supplied for {} rows",
                            known.len(),
                            rows.len()
                        ),
                    ));
                }
                known
                    .into_iter()
                    .enumerate()
                    .map(|(i, obj)| {
                        let slot = OnceLock::new();
                        if let Some(obj) = obj {
                            check_type(&class, &obj, i)?;
                            let _ = slot.set(obj);
                        }
                        Ok(slot)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        Ok(Self {
            source,
            class,
            rows,
            objects,
        })
    }

    /// Create a collection from JSON objects, one per row.
    #[allow(clippy::result_large_err)]
    pub fn from_json_rows(
        source: Arc<dyn ObjectSource>,
        class: TypeKey,
        rows: &[serde_json::Value],
    ) -> Result<Self> {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, value)| {
                Row::from_json(value).map_err(|err| match err {
                    Error::Collection(mut e) => {
                        e.index = Some(i);
                        Error::Collection(e)
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(source, class, rows, None)
    }

    /// The element type.
    pub fn class(&self) -> TypeKey {
        self.class
    }

    /// Number of elements. Never hydrates anything.
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn len(&self) -> usize {
        self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn exists(&self, index: usize) -> bool {
        index < self.count()
    }

    /// The element at `index`, hydrating it on first access.
    ///
    /// Every read of the same index returns the same object.
    #[allow(clippy::result_large_err)]
    pub fn get(&self, index: usize) -> Result<Object> {
        let (row, slot) = match (self.rows.get(index), self.objects.get(index)) {
            (Some(row), Some(slot)) => (row, slot),
            _ => {
                return Err(collection_error(
                    CollectionErrorKind::OutOfRange,
                    Some(index),
                    format!("collection has {} elements", self.count()),
                ));
            }
        };
        if let Some(obj) = slot.get() {
            return Ok(obj.clone());
        }

        let obj = self.source.get_object(&self.class, row)?;
        check_type(&self.class, &obj, index)?;
        // A concurrent reader may have filled the slot first; keep theirs.
        Ok(slot.get_or_init(|| obj).clone())
    }

    /// The element at `index` as its concrete type.
    #[allow(clippy::result_large_err)]
    pub fn get_as<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        let obj = self.get(index)?;
        obj.downcast::<T>().ok_or_else(|| {
            Error::Hydration(HydrationError {
                kind: HydrationErrorKind::WrongType,
                expected: std::any::type_name::<T>().to_string(),
                actual: obj.type_name().to_string(),
            })
        })
    }

    /// Has the element at `index` been hydrated or seeded yet?
    pub fn is_materialized(&self, index: usize) -> bool {
        self.objects.get(index).is_some_and(|slot| slot.get().is_some())
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Collections are read-only.
    #[allow(clippy::result_large_err)]
    pub fn set(&self, index: usize, _object: Object) -> Result<()> {
        Err(read_only(index))
    }

    /// Collections are read-only.
    #[allow(clippy::result_large_err)]
    pub fn unset(&self, index: usize) -> Result<()> {
        Err(read_only(index))
    }

    /// Iterate over all elements, hydrating as it goes.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            collection: self,
            next: 0,
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let materialized = self.objects.iter().filter(|s| s.get().is_some()).count();
        f.debug_struct("Collection")
            .field("class", &self.class)
            .field("len", &self.rows.len())
            .field("materialized", &materialized)
            .finish_non_exhaustive()
    }
}

/// Iterator over a [`Collection`].
#[derive(Debug)]
pub struct Iter<'a> {
    collection: &'a Collection,
    next: usize,
}

impl Iterator for Iter<'_> {
    type Item = Result<Object>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.collection.exists(self.next) {
            return None;
        }
        let item = self.collection.get(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.collection.count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a Collection {
    type Item = Result<Object>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Builds the collection returned by a multi-row fetch.
pub trait CollectionFactory: Send + Sync {
    #[allow(clippy::result_large_err)]
    fn create(
        &self,
        source: Arc<dyn ObjectSource>,
        class: TypeKey,
        rows: Vec<Row>,
        known: Vec<Option<Object>>,
    ) -> Result<Collection>;
}

/// Calls [`Collection::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCollectionFactory;

impl CollectionFactory for DefaultCollectionFactory {
    fn create(
        &self,
        source: Arc<dyn ObjectSource>,
        class: TypeKey,
        rows: Vec<Row>,
        known: Vec<Option<Object>>,
    ) -> Result<Collection> {
        Collection::new(source, class, rows, Some(known))
    }
}

#[allow(clippy::result_large_err)]
fn check_type(class: &TypeKey, obj: &Object, index: usize) -> Result<()> {
    if obj.type_key() == *class {
        return Ok(());
    }
    Err(collection_error(
        CollectionErrorKind::WrongType,
        Some(index),
        format!("expected {}, got {}", class.name(), obj.type_name()),
    ))
}

fn read_only(index: usize) -> Error {
    collection_error(
        CollectionErrorKind::ReadOnly,
        Some(index),
        "collections are read-only".to_string(),
    )
}

fn collection_error(kind: CollectionErrorKind, index: Option<usize>, message: String) -> Error {
    Error::Collection(CollectionError {
        kind,
        index,
        message,
    })
}
