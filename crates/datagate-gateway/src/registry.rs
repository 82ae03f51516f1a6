//! Registered domain types and their lazily loaded query maps.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use datagate_core::{
    Error, Factory, IdentityKey, LookupError, LookupErrorKind, QueryKey, QueryProvider,
    RegistrationError, RegistrationErrorKind, Result, Row, Template, TemplateMap, TypeKey,
};

use crate::{lock, read, write};

/// Identity fields used when none are given.
pub const DEFAULT_KEY_FIELDS: &[&str] = &["id"];

/// Whether a template returns one row or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// One entry of a type's query map.
#[derive(Debug, Clone)]
pub struct QueryDef {
    pub template: Template,
    pub cardinality: Cardinality,
}

/// Query key to template, merged from the provider's single and multi maps.
#[derive(Debug, Default)]
pub struct QueryMap {
    queries: HashMap<QueryKey, Arc<QueryDef>>,
}

impl QueryMap {
    /// Merge the provider's maps, rejecting empty names and empty templates.
    /// A key present in both maps takes the multi-row template.
    #[allow(clippy::result_large_err)]
    pub fn from_templates(class: &TypeKey, single: TemplateMap, many: TemplateMap) -> Result<Self> {
        let mut queries = HashMap::with_capacity(single.len() + many.len());
        for (cardinality, map) in [(Cardinality::One, single), (Cardinality::Many, many)] {
            for (name, sql) in map {
                if name.trim().is_empty() || sql.trim().is_empty() {
                    return Err(malformed(class, &name, "query map entry is empty"));
                }
                queries.insert(
                    QueryKey::from_name(&name),
                    Arc::new(QueryDef {
                        template: Template::parse(sql),
                        cardinality,
                    }),
                );
            }
        }
        Ok(Self { queries })
    }

    pub fn get(&self, key: &QueryKey) -> Option<&Arc<QueryDef>> {
        self.queries.get(key)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// All query keys, sorted.
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<_> = self.queries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn malformed(class: &TypeKey, name: &str, message: &str) -> Error {
    Error::Lookup(LookupError {
        kind: LookupErrorKind::MalformedQueryMap,
        type_name: Some(class.name().to_string()),
        name: name.to_string(),
        message: message.to_string(),
    })
}

/// A domain type known to the gateway.
pub struct RegisteredType {
    key: TypeKey,
    factory: Arc<dyn Factory>,
    provider: Arc<dyn QueryProvider>,
    key_fields: Vec<String>,
    /// Loaded on first fetch, then fixed.
    queries: Mutex<Option<Arc<QueryMap>>>,
}

impl RegisteredType {
    /// Check both collaborators accept `key` and build the entry.
    #[allow(clippy::result_large_err)]
    pub fn new(
        key: TypeKey,
        factory: Arc<dyn Factory>,
        provider: Arc<dyn QueryProvider>,
        key_fields: Vec<String>,
    ) -> Result<Self> {
        let reject = |kind| {
            Error::Registration(RegistrationError {
                kind,
                type_name: key.name().to_string(),
            })
        };
        if !factory.approve_class(&key) {
            return Err(reject(RegistrationErrorKind::FactoryRejected));
        }
        if !provider.approve_class(&key) {
            return Err(reject(RegistrationErrorKind::ProviderRejected));
        }
        if key_fields.is_empty() {
            return Err(reject(RegistrationErrorKind::EmptyKeyFields));
        }
        Ok(Self {
            key,
            factory,
            provider,
            key_fields,
            queries: Mutex::new(None),
        })
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn factory(&self) -> &Arc<dyn Factory> {
        &self.factory
    }

    pub fn provider(&self) -> &Arc<dyn QueryProvider> {
        &self.provider
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// Have the select templates been fetched from the provider yet?
    pub fn statements_loaded(&self) -> bool {
        lock(&self.queries).is_some()
    }

    /// The query map, asking the provider on first use.
    ///
    /// A failed load leaves the type unloaded so the next call asks again.
    #[allow(clippy::result_large_err)]
    pub fn queries(&self) -> Result<Arc<QueryMap>> {
        let mut slot = lock(&self.queries);
        if let Some(map) = slot.as_ref() {
            return Ok(Arc::clone(map));
        }
        let single = self.provider.single_select_templates(&self.key_fields)?;
        let many = self.provider.multi_select_templates(&self.key_fields)?;
        let map = Arc::new(QueryMap::from_templates(&self.key, single, many)?);
        tracing::debug!(
            class = self.key.name(),
            queries = map.len(),
            "Loaded select statements"
        );
        *slot = Some(Arc::clone(&map));
        Ok(map)
    }

    /// Look up one query by key.
    #[allow(clippy::result_large_err)]
    pub fn query(&self, key: &QueryKey) -> Result<Arc<QueryDef>> {
        let queries = self.queries()?;
        queries.get(key).cloned().ok_or_else(|| {
            Error::Lookup(LookupError {
                kind: LookupErrorKind::UnknownQuery,
                type_name: Some(self.key.name().to_string()),
                name: key.as_str().to_string(),
                message: "no such query".to_string(),
            })
        })
    }

    /// Identity key of `row` under this type's key fields.
    #[allow(clippy::result_large_err)]
    pub fn identity_key(&self, row: &Row) -> Result<IdentityKey> {
        IdentityKey::from_row(row, &self.key_fields)
    }
}

impl fmt::Debug for RegisteredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredType")
            .field("key", &self.key)
            .field("key_fields", &self.key_fields)
            .field("statements_loaded", &self.statements_loaded())
            .finish_non_exhaustive()
    }
}

/// All registered types, by type key.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<TypeKey, Arc<RegisteredType>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type. Registering the same type twice is an error.
    #[allow(clippy::result_large_err)]
    pub fn register(&self, ty: RegisteredType) -> Result<Arc<RegisteredType>> {
        let mut types = write(&self.types);
        if types.contains_key(&ty.key) {
            return Err(Error::Registration(RegistrationError {
                kind: RegistrationErrorKind::AlreadyRegistered,
                type_name: ty.key.name().to_string(),
            }));
        }
        let ty = Arc::new(ty);
        types.insert(ty.key, Arc::clone(&ty));
        Ok(ty)
    }

    #[allow(clippy::result_large_err)]
    pub fn get(&self, key: &TypeKey) -> Result<Arc<RegisteredType>> {
        read(&self.types)
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_registered(key.name()))
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        read(&self.types).contains_key(key)
    }

    /// Registered type keys, sorted by name.
    pub fn keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<_> = read(&self.types).keys().copied().collect();
        keys.sort_by_key(|k| k.name());
        keys
    }

    pub fn len(&self) -> usize {
        read(&self.types).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.types).is_empty()
    }
}
