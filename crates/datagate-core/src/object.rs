//! Type-erased domain object handles.
//!
//! The gateway stores domain objects of many types side by side, so it keeps
//! them as `Arc<dyn Any + Send + Sync>` and recovers the concrete type by
//! downcasting. Object identity is pointer identity of the shared `Arc`.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Names one domain type.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key for `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A shared, type-erased domain object.
///
/// Cloning an `Object` clones the handle, not the domain value: both
/// handles satisfy [`Object::ptr_eq`].
#[derive(Clone)]
pub struct Object {
    inner: Arc<dyn Any + Send + Sync>,
    key: TypeKey,
}

impl Object {
    /// Wrap a freshly built domain value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing shared domain value without copying it.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            key: TypeKey::of::<T>(),
        }
    }

    /// The exact runtime type of the wrapped value.
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    /// Is the wrapped value exactly a `T`?
    pub fn is<T: Any>(&self) -> bool {
        self.key.id() == TypeId::of::<T>()
    }

    /// Borrow the wrapped value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Recover the shared `Arc<T>`; the result points at the same value.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Do both handles refer to the same domain value?
    pub fn ptr_eq(&self, other: &Object) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.key.name())
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Foo {
        id: i64,
    }

    struct Bar;

    #[test]
    fn type_key_identity_and_names() {
        assert_eq!(TypeKey::of::<Foo>(), TypeKey::of::<Foo>());
        assert_ne!(TypeKey::of::<Foo>(), TypeKey::of::<Bar>());
        assert_eq!(TypeKey::of::<Foo>().short_name(), "Foo");
        assert!(TypeKey::of::<Foo>().name().ends_with("Foo"));
    }

    #[test]
    fn downcast_keeps_pointer_identity() {
        let obj = Object::new(Foo { id: 1 });
        assert!(obj.is::<Foo>());
        assert!(!obj.is::<Bar>());
        assert_eq!(obj.downcast_ref::<Foo>(), Some(&Foo { id: 1 }));

        let a = obj.downcast::<Foo>().unwrap();
        let b = obj.downcast::<Foo>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(obj.downcast::<Bar>().is_none());
    }

    #[test]
    fn ptr_eq_distinguishes_equal_values() {
        let shared = Arc::new(Foo { id: 1 });
        let a = Object::from_arc(Arc::clone(&shared));
        let b = Object::from_arc(shared);
        let c = Object::new(Foo { id: 1 });
        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&c));
    }
}
