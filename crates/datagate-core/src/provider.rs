//! Statement generation strategy.

use std::collections::BTreeMap;

use crate::Result;
use crate::object::TypeKey;

/// Query key to template text.
pub type TemplateMap = BTreeMap<String, String>;

/// Supplies the query templates for one domain type.
///
/// Templates use `:name` placeholders. Select templates are grouped by the
/// query key they answer (`single`, `all`, or any named key such as
/// `byEmail`); single-select templates return one row, multi-select
/// templates return many.
pub trait QueryProvider: Send + Sync {
    /// Does this provider know how to query `class`?
    fn approve_class(&self, class: &TypeKey) -> bool;

    #[allow(clippy::result_large_err)]
    fn single_select_templates(&self, key_fields: &[String]) -> Result<TemplateMap>;

    #[allow(clippy::result_large_err)]
    fn multi_select_templates(&self, key_fields: &[String]) -> Result<TemplateMap>;

    /// Insert-or-update statement binding every field in `all_fields`.
    #[allow(clippy::result_large_err)]
    fn upsert_template(&self, key_fields: &[String], all_fields: &[String]) -> Result<String>;

    /// Delete statement binding exactly the key fields.
    #[allow(clippy::result_large_err)]
    fn delete_template(&self, key_fields: &[String]) -> Result<String>;
}

impl<P: QueryProvider + ?Sized> QueryProvider for std::sync::Arc<P> {
    fn approve_class(&self, class: &TypeKey) -> bool {
        (**self).approve_class(class)
    }

    fn single_select_templates(&self, key_fields: &[String]) -> Result<TemplateMap> {
        (**self).single_select_templates(key_fields)
    }

    fn multi_select_templates(&self, key_fields: &[String]) -> Result<TemplateMap> {
        (**self).multi_select_templates(key_fields)
    }

    fn upsert_template(&self, key_fields: &[String], all_fields: &[String]) -> Result<String> {
        (**self).upsert_template(key_fields, all_fields)
    }

    fn delete_template(&self, key_fields: &[String]) -> Result<String> {
        (**self).delete_template(key_fields)
    }
}

/// A [`QueryProvider`] that generates plain statements for one table.
///
/// - `single`: `SELECT * FROM t WHERE k1 = :k1 AND ...`
/// - `all`: `SELECT * FROM t`
/// - upsert: `INSERT INTO t (...) VALUES (...) ON DUPLICATE KEY UPDATE ...`
/// - delete: `DELETE FROM t WHERE k1 = :k1 AND ...`
///
/// Extra named queries are added with [`single`](Self::single) and
/// [`many`](Self::many).
#[derive(Debug, Clone)]
pub struct TableQueryProvider {
    class: TypeKey,
    table: String,
    single: TemplateMap,
    many: TemplateMap,
}

impl TableQueryProvider {
    pub fn new(class: TypeKey, table: impl Into<String>) -> Self {
        Self {
            class,
            table: table.into(),
            single: TemplateMap::new(),
            many: TemplateMap::new(),
        }
    }

    /// Shorthand for `new(TypeKey::of::<T>(), table)`.
    pub fn for_type<T: std::any::Any>(table: impl Into<String>) -> Self {
        Self::new(TypeKey::of::<T>(), table)
    }

    /// Add a named single-row query.
    pub fn single(mut self, key: impl Into<String>, sql: impl Into<String>) -> Self {
        self.single.insert(key.into(), sql.into());
        self
    }

    /// Add a named multi-row query.
    pub fn many(mut self, key: impl Into<String>, sql: impl Into<String>) -> Self {
        self.many.insert(key.into(), sql.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn key_predicate(key_fields: &[String]) -> String {
        key_fields
            .iter()
            .map(|k| format!("{k} = :{k}"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

impl QueryProvider for TableQueryProvider {
    fn approve_class(&self, class: &TypeKey) -> bool {
        *class == self.class
    }

    fn single_select_templates(&self, key_fields: &[String]) -> Result<TemplateMap> {
        let mut map = self.single.clone();
        map.entry("single".to_string()).or_insert_with(|| {
            format!(
                "SELECT * FROM {} WHERE {}",
                self.table,
                Self::key_predicate(key_fields)
            )
        });
        Ok(map)
    }

    fn multi_select_templates(&self, _key_fields: &[String]) -> Result<TemplateMap> {
        let mut map = self.many.clone();
        map.entry("all".to_string())
            .or_insert_with(|| format!("SELECT * FROM {}", self.table));
        Ok(map)
    }

    fn upsert_template(&self, key_fields: &[String], all_fields: &[String]) -> Result<String> {
        let columns = all_fields.join(", ");
        let values = all_fields
            .iter()
            .map(|f| format!(":{f}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut updates = all_fields
            .iter()
            .filter(|f| !key_fields.contains(f))
            .map(|f| format!("{f} = VALUES({f})"))
            .collect::<Vec<_>>();
        if updates.is_empty() {
            // Key-only rows still need a syntactically valid update clause.
            updates = key_fields.iter().map(|k| format!("{k} = {k}")).collect();
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
            self.table,
            columns,
            values,
            updates.join(", ")
        );
        tracing::trace!(table = %self.table, sql = %sql, "Generated upsert template");
        Ok(sql)
    }

    fn delete_template(&self, key_fields: &[String]) -> Result<String> {
        Ok(format!(
            "DELETE FROM {} WHERE {}",
            self.table,
            Self::key_predicate(key_fields)
        ))
    }
}
