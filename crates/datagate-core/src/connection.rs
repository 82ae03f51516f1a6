//! Database connection trait.
//!
//! The gateway talks to its backend through [`Connection`]: prepare a
//! template once, execute it with named parameters, then read one row or
//! all rows. Calls are synchronous and block until the backend answers.
//! Errors returned by an implementation reach the gateway's caller
//! unchanged.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Named parameters bound to a prepared statement, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl From<&Row> for Params {
    fn from(row: &Row) -> Self {
        row.iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// A synchronous connection that prepares and runs named-parameter
/// statements.
///
/// `fetch_one` and `fetch_all` read the result of the most recent
/// `execute` of the given statement.
///
/// # Example
///
/// ```rust,ignore
/// let stmt = conn.prepare("SELECT * FROM users WHERE id = :id")?;
/// let mut params = Params::new();
/// params.insert("id", 1_i64);
/// conn.execute(&stmt, &params)?;
/// let row = conn.fetch_one(&stmt)?;
/// ```
pub trait Connection: Send {
    /// Handle returned by `prepare`; the gateway keeps one per template.
    type Statement: Clone + Send + Sync + 'static;

    /// Prepare a template for execution.
    #[allow(clippy::result_large_err)]
    fn prepare(&mut self, sql: &str) -> Result<Self::Statement>;

    /// Execute a prepared statement with the given parameters.
    #[allow(clippy::result_large_err)]
    fn execute(&mut self, statement: &Self::Statement, params: &Params) -> Result<()>;

    /// Read the next row of the last execution, if any.
    #[allow(clippy::result_large_err)]
    fn fetch_one(&mut self, statement: &Self::Statement) -> Result<Option<Row>>;

    /// Read all remaining rows of the last execution.
    #[allow(clippy::result_large_err)]
    fn fetch_all(&mut self, statement: &Self::Statement) -> Result<Vec<Row>>;
}
