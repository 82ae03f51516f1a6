//! Prepared statements and memoized read results.
//!
//! Statements are kept per template text for the lifetime of the gateway.
//! Results are keyed by the requesting type, the template text and the
//! canonical parameter key. Write statements share the statement table but
//! their executions are never memoized.

use std::collections::HashMap;

use datagate_core::{ParamKey, TypeKey};

use crate::config::CachePolicy;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResultKey {
    class: TypeKey,
    sql: String,
    params: ParamKey,
}

#[derive(Debug)]
struct CachedResult<V> {
    value: V,
    last_used: u64,
}

/// Statement handles of type `S` and memoized values of type `V`.
#[derive(Debug)]
pub struct QueryCache<S, V> {
    statements: HashMap<String, S>,
    results: HashMap<ResultKey, CachedResult<V>>,
    policy: CachePolicy,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl<S: Clone, V: Clone> QueryCache<S, V> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            statements: HashMap::new(),
            results: HashMap::new(),
            policy,
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a memoized result, counting the hit or miss.
    pub fn lookup(&mut self, class: TypeKey, sql: &str, params: &ParamKey) -> Option<V> {
        self.tick += 1;
        let key = ResultKey {
            class,
            sql: sql.to_string(),
            params: params.clone(),
        };
        match self.results.get_mut(&key) {
            Some(entry) => {
                entry.last_used = self.tick;
                self.hits += 1;
                tracing::trace!(class = class.name(), sql, "Query cache hit");
                Some(entry.value.clone())
            }
            None => {
                self.misses += 1;
                tracing::trace!(class = class.name(), sql, "Query cache miss");
                None
            }
        }
    }

    /// Look up a memoized result without counting it or touching LRU order.
    pub fn peek(&self, class: TypeKey, sql: &str, params: &ParamKey) -> Option<&V> {
        let key = ResultKey {
            class,
            sql: sql.to_string(),
            params: params.clone(),
        };
        self.results.get(&key).map(|entry| &entry.value)
    }

    /// Memoize a result. An existing entry for the same key is kept and
    /// returned instead.
    pub fn store(&mut self, class: TypeKey, sql: &str, params: ParamKey, value: V) -> V {
        self.tick += 1;
        let key = ResultKey {
            class,
            sql: sql.to_string(),
            params,
        };
        if let Some(existing) = self.results.get_mut(&key) {
            existing.last_used = self.tick;
            return existing.value.clone();
        }
        self.insert_new(key, value.clone());
        value
    }

    /// Memoize a result, overwriting any existing entry for the same key.
    pub fn replace(&mut self, class: TypeKey, sql: &str, params: ParamKey, value: V) {
        self.tick += 1;
        let key = ResultKey {
            class,
            sql: sql.to_string(),
            params,
        };
        if let Some(existing) = self.results.get_mut(&key) {
            existing.value = value;
            existing.last_used = self.tick;
            return;
        }
        self.insert_new(key, value);
    }

    /// Prepared statement for a template, if any.
    pub fn statement(&self, sql: &str) -> Option<S> {
        self.statements.get(sql).cloned()
    }

    /// Remember the prepared statement for a template.
    pub fn insert_statement(&mut self, sql: &str, statement: S) {
        self.statements.insert(sql.to_string(), statement);
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of memoized results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of prepared statements.
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    fn insert_new(&mut self, key: ResultKey, value: V) {
        if let Some(cap) = self.policy.capacity() {
            if self.results.len() >= cap {
                self.evict_lru();
            }
        }
        self.results.insert(
            key,
            CachedResult {
                value,
                last_used: self.tick,
            },
        );
    }

    fn evict_lru(&mut self) {
        let lru_key = self
            .results
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = lru_key {
            self.results.remove(&key);
            tracing::warn!(
                class = key.class.name(),
                sql = %key.sql,
                "Query cache full, evicted least recently used result"
            );
        }
    }
}

impl<S: Clone, V: Clone> Default for QueryCache<S, V> {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}
