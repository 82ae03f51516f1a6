//! Identity map: one object per (type, identity key).
//!
//! Each registered type gets its own bucket keyed by the canonical
//! [`IdentityKey`] of a row, so two rows whose key fields are equal as sets
//! of `(field, value)` pairs resolve to the same object handle. Entries keep
//! the raw row they were built from alongside the object.
//!
//! With the default [`CachePolicy::Unbounded`] nothing is ever evicted.
//! A bounded policy caps every bucket separately and drops the least
//! recently used entry when a new key arrives at a full bucket.

use std::collections::HashMap;

use datagate_core::{IdentityKey, Object, Row, TypeKey};

use crate::config::CachePolicy;

#[derive(Debug)]
struct IdentityEntry {
    row: Row,
    object: Object,
    last_used: u64,
}

/// Per-type identity buckets.
#[derive(Debug, Default)]
pub struct IdentityMap {
    buckets: HashMap<TypeKey, HashMap<IdentityKey, IdentityEntry>>,
    policy: CachePolicy,
    /// Logical clock for LRU ordering
    tick: u64,
}

impl IdentityMap {
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            buckets: HashMap::new(),
            policy,
            tick: 0,
        }
    }

    /// Create the empty bucket for a newly registered type.
    pub fn add_bucket(&mut self, class: TypeKey) {
        self.buckets.entry(class).or_default();
    }

    /// Look up an object and mark it as recently used.
    pub fn get(&mut self, class: &TypeKey, key: &IdentityKey) -> Option<Object> {
        let tick = self.next_tick();
        let entry = self.buckets.get_mut(class)?.get_mut(key)?;
        entry.last_used = tick;
        Some(entry.object.clone())
    }

    /// Look up an object without touching its LRU position.
    pub fn peek(&self, class: &TypeKey, key: &IdentityKey) -> Option<&Object> {
        self.buckets.get(class)?.get(key).map(|e| &e.object)
    }

    /// The raw row an entry was built from or last saved with.
    pub fn row(&self, class: &TypeKey, key: &IdentityKey) -> Option<&Row> {
        self.buckets.get(class)?.get(key).map(|e| &e.row)
    }

    pub fn contains(&self, class: &TypeKey, key: &IdentityKey) -> bool {
        self.peek(class, key).is_some()
    }

    /// Keep the existing object for `key` if there is one, otherwise store
    /// `object`. Returns the object now held for `key`.
    pub fn get_or_insert(
        &mut self,
        class: TypeKey,
        key: IdentityKey,
        row: Row,
        object: Object,
    ) -> Object {
        if let Some(existing) = self.get(&class, &key) {
            return existing;
        }
        self.store(class, key, row, object.clone());
        object
    }

    /// Store `{row, object}` for `key`, replacing any previous entry.
    ///
    /// Returns the object previously held for `key`.
    pub fn insert(
        &mut self,
        class: TypeKey,
        key: IdentityKey,
        row: Row,
        object: Object,
    ) -> Option<Object> {
        self.store(class, key, row, object)
    }

    fn store(&mut self, class: TypeKey, key: IdentityKey, row: Row, object: Object) -> Option<Object> {
        let tick = self.next_tick();
        let capacity = self.policy.capacity();
        let bucket = self.buckets.entry(class).or_default();

        if let Some(cap) = capacity {
            if !bucket.contains_key(&key) && bucket.len() >= cap {
                evict_lru(class, bucket);
            }
        }

        bucket
            .insert(
                key,
                IdentityEntry {
                    row,
                    object,
                    last_used: tick,
                },
            )
            .map(|previous| previous.object)
    }

    /// Number of entries held for one type.
    pub fn len_of(&self, class: &TypeKey) -> usize {
        self.buckets.get(class).map_or(0, HashMap::len)
    }

    /// Number of entries across all types.
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

fn evict_lru(class: TypeKey, bucket: &mut HashMap<IdentityKey, IdentityEntry>) {
    let lru_key = bucket
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(key, _)| key.clone());
    if let Some(key) = lru_key {
        bucket.remove(&key);
        tracing::warn!(
            class = class.name(),
            key = %key,
            "Identity map full, evicted least recently used object"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::Value;

    struct User {
        #[allow(dead_code)]
        id: i64,
    }

    struct Team;

    fn key(id: i64) -> IdentityKey {
        IdentityKey::from_row(&row(id), &["id"]).unwrap()
    }

    fn row(id: i64) -> Row {
        Row::from_pairs([("id", Value::Int(id))])
    }

    #[test]
    fn first_object_wins() {
        let mut map = IdentityMap::default();
        let class = TypeKey::of::<User>();
        let first = Object::new(User { id: 1 });
        let second = Object::new(User { id: 1 });

        let held = map.get_or_insert(class, key(1), row(1), first.clone());
        assert!(held.ptr_eq(&first));
        let held = map.get_or_insert(class, key(1), row(1), second);
        assert!(held.ptr_eq(&first));
        assert_eq!(map.len_of(&class), 1);
    }

    #[test]
    fn insert_replaces_entry() {
        let mut map = IdentityMap::default();
        let class = TypeKey::of::<User>();
        let first = Object::new(User { id: 1 });
        let second = Object::new(User { id: 1 });

        assert!(map.insert(class, key(1), row(1), first.clone()).is_none());
        let updated = Row::from_pairs([("id", Value::Int(1)), ("name", Value::from("x"))]);
        let previous = map.insert(class, key(1), updated.clone(), second.clone());
        assert!(previous.unwrap().ptr_eq(&first));
        assert!(map.peek(&class, &key(1)).unwrap().ptr_eq(&second));
        assert_eq!(map.row(&class, &key(1)), Some(&updated));
    }

    #[test]
    fn buckets_are_per_type() {
        let mut map = IdentityMap::default();
        map.add_bucket(TypeKey::of::<Team>());
        map.insert(TypeKey::of::<User>(), key(1), row(1), Object::new(User { id: 1 }));

        assert!(map.contains(&TypeKey::of::<User>(), &key(1)));
        assert!(!map.contains(&TypeKey::of::<Team>(), &key(1)));
        assert_eq!(map.len_of(&TypeKey::of::<Team>()), 0);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn bounded_bucket_evicts_least_recently_used() {
        let mut map = IdentityMap::new(CachePolicy::lru(2));
        let class = TypeKey::of::<User>();
        for id in 1..=2 {
            map.insert(class, key(id), row(id), Object::new(User { id }));
        }
        // Touch 1 so 2 becomes the oldest.
        assert!(map.get(&class, &key(1)).is_some());
        map.insert(class, key(3), row(3), Object::new(User { id: 3 }));

        assert_eq!(map.len_of(&class), 2);
        assert!(map.contains(&class, &key(1)));
        assert!(!map.contains(&class, &key(2)));
        assert!(map.contains(&class, &key(3)));
    }

    #[test]
    fn unbounded_never_evicts() {
        let mut map = IdentityMap::default();
        let class = TypeKey::of::<User>();
        for id in 0..500 {
            map.insert(class, key(id), row(id), Object::new(User { id }));
        }
        assert_eq!(map.len(), 500);
    }
}
