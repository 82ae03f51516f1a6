//! The gateway: registry, fetch family, save and delete.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use datagate_core::{
    Connection, Error, Factory, HydrationError, HydrationErrorKind, Marker, NotFoundError, Object,
    ParamKey, Params, QueryKey, QueryProvider, Result, Row, StatementError, StatementErrorKind,
    Template, TypeKey, Value,
};

use crate::collection::{Collection, CollectionFactory};
use crate::config::GatewayConfig;
use crate::lock;
use crate::query_cache::QueryCache;
use crate::registry::{Cardinality, QueryDef, RegisteredType};
use crate::source::{IdentityScope, ObjectSource};

/// Result of a fetch: one object or a collection, depending on which map
/// the query came from.
#[derive(Debug, Clone)]
pub enum Fetched {
    One(Object),
    Many(Arc<Collection>),
}

impl Fetched {
    pub fn object(&self) -> Option<&Object> {
        match self {
            Fetched::One(obj) => Some(obj),
            Fetched::Many(_) => None,
        }
    }

    pub fn collection(&self) -> Option<&Arc<Collection>> {
        match self {
            Fetched::One(_) => None,
            Fetched::Many(coll) => Some(coll),
        }
    }

    /// The single object, or an error if the query returns many rows.
    #[allow(clippy::result_large_err)]
    pub fn into_object(self) -> Result<Object> {
        match self {
            Fetched::One(obj) => Ok(obj),
            Fetched::Many(coll) => Err(Error::Hydration(HydrationError {
                kind: HydrationErrorKind::WrongType,
                expected: format!("a single {}", coll.class().name()),
                actual: "a collection".to_string(),
            })),
        }
    }

    /// The collection, or an error if the query returns one row.
    #[allow(clippy::result_large_err)]
    pub fn into_collection(self) -> Result<Arc<Collection>> {
        match self {
            Fetched::Many(coll) => Ok(coll),
            Fetched::One(obj) => Err(Error::Hydration(HydrationError {
                kind: HydrationErrorKind::NotACollection,
                expected: obj.type_name().to_string(),
                actual: "a single object".to_string(),
            })),
        }
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Fetches answered from the query cache
    pub query_hits: u64,
    /// Fetches that went to the connection
    pub query_misses: u64,
    /// Statements executed on the connection, reads and writes
    pub round_trips: u64,
    /// Memoized query results currently held
    pub cached_results: usize,
    /// Identity map entries across all types
    pub identity_entries: usize,
    /// Distinct templates prepared
    pub prepared_statements: usize,
}

/// A data mapper over one [`Connection`].
///
/// Domain types are registered with a [`Factory`] and a [`QueryProvider`].
/// Reads are memoized per (template, parameters) and resolved through an
/// identity map, so the same row always yields the same object. Writes are
/// never memoized.
///
/// All methods take `&self`; the gateway can be shared between threads when
/// the connection is `Send`. The connection lock is held while a factory
/// builds objects for a fetch, so factories must not call back into the
/// fetch methods of the same gateway.
pub struct Gateway<C: Connection> {
    connection: Mutex<C>,
    scope: Arc<IdentityScope>,
    collections: Arc<dyn CollectionFactory>,
    queries: Mutex<QueryCache<C::Statement, Fetched>>,
    config: GatewayConfig,
    round_trips: AtomicU64,
}

impl<C: Connection> Gateway<C> {
    /// Create a gateway with the default configuration.
    pub fn new(connection: C, collections: Arc<dyn CollectionFactory>) -> Self {
        Self::with_config(connection, collections, GatewayConfig::default())
    }

    pub fn with_config(
        connection: C,
        collections: Arc<dyn CollectionFactory>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            connection: Mutex::new(connection),
            scope: Arc::new(IdentityScope::new(config.identity_cache)),
            collections,
            queries: Mutex::new(QueryCache::new(config.query_cache)),
            config,
            round_trips: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The object source handed to collections.
    pub fn source(&self) -> Arc<dyn ObjectSource> {
        self.scope.clone()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register `T` with its factory, query provider and identity fields.
    ///
    /// Pass [`DEFAULT_KEY_FIELDS`](crate::DEFAULT_KEY_FIELDS) for a plain
    /// `id` key.
    #[allow(clippy::result_large_err)]
    pub fn add_type<T: Any>(
        &self,
        factory: impl Factory + 'static,
        provider: impl QueryProvider + 'static,
        key_fields: &[&str],
    ) -> Result<()> {
        self.add_type_with_key(
            TypeKey::of::<T>(),
            Arc::new(factory),
            Arc::new(provider),
            key_fields,
        )
    }

    /// Register a type by key.
    #[tracing::instrument(level = "debug", skip_all, fields(class = class.name()))]
    #[allow(clippy::result_large_err)]
    pub fn add_type_with_key(
        &self,
        class: TypeKey,
        factory: Arc<dyn Factory>,
        provider: Arc<dyn QueryProvider>,
        key_fields: &[&str],
    ) -> Result<()> {
        let key_fields = key_fields.iter().map(|f| (*f).to_string()).collect();
        let ty = RegisteredType::new(class, factory, provider, key_fields)?;
        self.scope.register(ty)?;
        tracing::debug!("Registered type");
        Ok(())
    }

    pub fn type_is_registered(&self, class: &TypeKey) -> bool {
        self.scope.registry().contains(class)
    }

    /// The factory registered for `class`.
    #[allow(clippy::result_large_err)]
    pub fn factory(&self, class: &TypeKey) -> Result<Arc<dyn Factory>> {
        Ok(Arc::clone(self.scope.registry().get(class)?.factory()))
    }

    #[allow(clippy::result_large_err)]
    pub fn key_fields(&self, class: &TypeKey) -> Result<Vec<String>> {
        Ok(self.scope.registry().get(class)?.key_fields().to_vec())
    }

    /// Names of all registered types, sorted.
    pub fn registered_type_names(&self) -> Vec<&'static str> {
        self.scope
            .registry()
            .keys()
            .into_iter()
            .map(|k| k.name())
            .collect()
    }

    /// Has `class` loaded its select statements yet?
    #[allow(clippy::result_large_err)]
    pub fn statements_loaded(&self, class: &TypeKey) -> Result<bool> {
        Ok(self.scope.registry().get(class)?.statements_loaded())
    }

    /// The raw row last stored for `row`'s identity key.
    pub fn cached_row(&self, class: &TypeKey, row: &Row) -> Option<Row> {
        self.scope.cached_row(class, row)
    }

    // ------------------------------------------------------------------
    // Fetch family
    // ------------------------------------------------------------------

    /// Run the query `key` of `class` with positional `params`.
    ///
    /// Parameters bind to the template's placeholders in order of first
    /// appearance. Results are memoized: the same template with the same
    /// parameters reaches the connection at most once.
    #[tracing::instrument(level = "debug", skip_all, fields(class = class.name(), query = %key))]
    #[allow(clippy::result_large_err)]
    pub fn fetch_with(&self, class: &TypeKey, key: &QueryKey, params: &[Value]) -> Result<Fetched> {
        let ty = self.scope.registry().get(class)?;
        let def = ty.query(key)?;
        let bound = def.template.bind(params)?;
        let param_key = ParamKey::new(params);
        let sql = def.template.sql();

        if let Some(hit) = lock(&self.queries).lookup(*class, sql, &param_key) {
            return Ok(hit);
        }

        let mut conn = lock(&self.connection);
        // Another caller may have filled the entry while we waited.
        if let Some(hit) = lock(&self.queries).peek(*class, sql, &param_key).cloned() {
            return Ok(hit);
        }

        let statement = self.statement(&mut conn, sql)?;
        conn.execute(&statement, &bound)?;
        self.round_trips.fetch_add(1, Ordering::Relaxed);

        let fetched = match def.cardinality {
            Cardinality::One => {
                let row = conn.fetch_one(&statement)?.ok_or_else(|| {
                    Error::NotFound(NotFoundError {
                        type_name: class.name().to_string(),
                        sql: sql.to_string(),
                    })
                })?;
                Fetched::One(self.scope.hydrate(class, &row)?)
            }
            Cardinality::Many => {
                let rows = conn.fetch_all(&statement)?;
                Fetched::Many(Arc::new(self.collect(class, rows)?))
            }
        };
        drop(conn);

        Ok(lock(&self.queries).store(*class, sql, param_key, fetched))
    }

    /// Fetch one `T` with the `single` query.
    #[allow(clippy::result_large_err)]
    pub fn fetch<T: Any + Send + Sync>(&self, params: &[Value]) -> Result<Arc<T>> {
        let obj = self
            .fetch_with(&TypeKey::of::<T>(), &QueryKey::Single, params)?
            .into_object()?;
        downcast(&obj)
    }

    /// Fetch every `T` with the `all` query.
    #[allow(clippy::result_large_err)]
    pub fn fetch_all<T: Any>(&self, params: &[Value]) -> Result<Arc<Collection>> {
        self.fetch_with(&TypeKey::of::<T>(), &QueryKey::All, params)?
            .into_collection()
    }

    /// Run a named query of `T`, e.g. `fetch_by::<User>("byEmail", ...)`.
    #[allow(clippy::result_large_err)]
    pub fn fetch_by<T: Any>(&self, name: &str, params: &[Value]) -> Result<Fetched> {
        self.fetch_with(&TypeKey::of::<T>(), &QueryKey::by(name), params)
    }

    /// Resolve a `fetch`, `fetchAll` or `fetchBy<Name>` operation name and
    /// run it.
    #[allow(clippy::result_large_err)]
    pub fn fetch_operation(
        &self,
        class: &TypeKey,
        operation: &str,
        params: &[Value],
    ) -> Result<Fetched> {
        let key = QueryKey::from_operation(operation).map_err(|err| match err {
            Error::Lookup(mut e) => {
                e.type_name = Some(class.name().to_string());
                Error::Lookup(e)
            }
            other => other,
        })?;
        self.fetch_with(class, &key, params)
    }

    /// The canonical object for `row`, building it on first sight.
    #[allow(clippy::result_large_err)]
    pub fn get_object(&self, class: &TypeKey, row: &Row) -> Result<Object> {
        self.scope.hydrate(class, row)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Upsert `object`, then save the objects reachable through each of the
    /// `nested` accessors of its factory.
    ///
    /// After a save, fetches resolving to the same identity key return this
    /// exact object. The type's select statements are loaded before the
    /// upsert runs, so a malformed query map fails the save with nothing
    /// written.
    #[tracing::instrument(level = "debug", skip(self, object), fields(class = object.type_name()))]
    #[allow(clippy::result_large_err)]
    pub fn save(&self, object: &Object, nested: &[&str]) -> Result<()> {
        let class = object.type_key();
        let ty = self.scope.registry().get(&class)?;
        let row = ty.factory().dismantle(object)?;

        let fields: Vec<String> = row.field_names().map(str::to_string).collect();
        let template = Template::parse(ty.provider().upsert_template(ty.key_fields(), &fields)?);
        for marker in [Marker::Insert, Marker::ConflictUpdate] {
            require_marker(&ty, &template, marker)?;
        }
        require_fields(&ty, &template, fields.iter().map(String::as_str))?;
        ty.identity_key(&row)?;
        let single = ty.queries()?.get(&QueryKey::Single).cloned();

        self.execute(&template, &Params::from(&row))?;
        self.scope.remember(&class, row.clone(), object.clone())?;
        if let Some(def) = single {
            self.remember_single(&ty, &def, &row, object);
        }
        tracing::debug!("Saved object");

        for accessor in nested {
            for related in ty.factory().related(object, accessor)?.into_objects() {
                self.save(&related, &[])?;
            }
        }
        Ok(())
    }

    /// Delete `object` by its key fields.
    ///
    /// The identity map keeps its entry.
    #[tracing::instrument(level = "debug", skip(self, object), fields(class = object.type_name()))]
    #[allow(clippy::result_large_err)]
    pub fn delete(&self, object: &Object) -> Result<()> {
        let class = object.type_key();
        let ty = self.scope.registry().get(&class)?;
        let row = ty.factory().dismantle(object)?;

        let template = Template::parse(ty.provider().delete_template(ty.key_fields())?);
        require_marker(&ty, &template, Marker::Delete)?;
        require_fields(&ty, &template, ty.key_fields().iter().map(String::as_str))?;

        let keys = row.subset(ty.key_fields())?;
        self.execute(&template, &Params::from(&keys))?;
        tracing::debug!("Deleted object");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn stats(&self) -> GatewayStats {
        let queries = lock(&self.queries);
        GatewayStats {
            query_hits: queries.hits(),
            query_misses: queries.misses(),
            round_trips: self.round_trips.load(Ordering::Relaxed),
            cached_results: queries.len(),
            identity_entries: self.scope.identity_len(),
            prepared_statements: queries.statement_count(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Prepared statement for `sql`, preparing it on first use.
    #[allow(clippy::result_large_err)]
    fn statement(&self, conn: &mut C, sql: &str) -> Result<C::Statement> {
        if let Some(statement) = lock(&self.queries).statement(sql) {
            return Ok(statement);
        }
        tracing::trace!(sql, "Preparing statement");
        let statement = conn.prepare(sql)?;
        lock(&self.queries).insert_statement(sql, statement.clone());
        Ok(statement)
    }

    /// Run a write statement. Nothing is memoized.
    #[allow(clippy::result_large_err)]
    fn execute(&self, template: &Template, params: &Params) -> Result<()> {
        let mut conn = lock(&self.connection);
        let statement = self.statement(&mut conn, template.sql())?;
        conn.execute(&statement, params)?;
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Point the memoized `single` lookup for the saved row's key at
    /// `object`, when that query binds exactly the key fields.
    fn remember_single(&self, ty: &RegisteredType, def: &QueryDef, row: &Row, object: &Object) {
        let keys: BTreeSet<&str> = ty.key_fields().iter().map(String::as_str).collect();
        if def.cardinality != Cardinality::One || def.template.placeholder_set() != keys {
            return;
        }
        let Some(params) = def
            .template
            .placeholders()
            .iter()
            .map(|name| row.get(name).cloned())
            .collect::<Option<Vec<Value>>>()
        else {
            return;
        };
        lock(&self.queries).replace(
            ty.key(),
            def.template.sql(),
            ParamKey::new(&params),
            Fetched::One(object.clone()),
        );
    }

    /// Wrap fetched rows in a collection, seeding objects already in the
    /// identity map.
    #[allow(clippy::result_large_err)]
    fn collect(&self, class: &TypeKey, rows: Vec<Row>) -> Result<Collection> {
        let count = rows.len();
        let known = rows
            .iter()
            .map(|row| self.scope.known_object(class, row))
            .collect();
        let collection = self
            .collections
            .create(self.source(), *class, rows, known)?;
        if collection.class() != *class || collection.count() != count {
            return Err(Error::Hydration(HydrationError {
                kind: HydrationErrorKind::NotACollection,
                expected: format!("{} rows of {}", count, class.name()),
                actual: format!(
                    "{} rows of {}",
                    collection.count(),
                    collection.class().name()
                ),
            }));
        }
        Ok(collection)
    }
}

impl<C: Connection> fmt::Debug for Gateway<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("types", &self.registered_type_names())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::result_large_err)]
fn downcast<T: Any + Send + Sync>(obj: &Object) -> Result<Arc<T>> {
    obj.downcast::<T>().ok_or_else(|| {
        Error::Hydration(HydrationError {
            kind: HydrationErrorKind::WrongType,
            expected: std::any::type_name::<T>().to_string(),
            actual: obj.type_name().to_string(),
        })
    })
}

#[allow(clippy::result_large_err)]
fn require_marker(ty: &RegisteredType, template: &Template, marker: Marker) -> Result<()> {
    if template.has_marker(marker) {
        return Ok(());
    }
    Err(Error::Statement(StatementError {
        kind: StatementErrorKind::MissingMarker,
        type_name: ty.key().name().to_string(),
        sql: template.sql().to_string(),
        marker: Some(marker.keyword()),
        missing: Vec::new(),
        unexpected: Vec::new(),
    }))
}

/// The template's placeholders must be exactly `fields`, as sets.
#[allow(clippy::result_large_err)]
fn require_fields<'a>(
    ty: &RegisteredType,
    template: &Template,
    fields: impl Iterator<Item = &'a str>,
) -> Result<()> {
    let fields: BTreeSet<&str> = fields.collect();
    let placeholders = template.placeholder_set();
    if fields == placeholders {
        return Ok(());
    }
    Err(Error::Statement(StatementError {
        kind: StatementErrorKind::KeysMismatch,
        type_name: ty.key().name().to_string(),
        sql: template.sql().to_string(),
        marker: None,
        missing: placeholders
            .difference(&fields)
            .map(|s| (*s).to_string())
            .collect(),
        unexpected: fields
            .difference(&placeholders)
            .map(|s| (*s).to_string())
            .collect(),
    }))
}
