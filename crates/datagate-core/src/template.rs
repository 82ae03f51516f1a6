//! Query templates with `:name` placeholders.
//!
//! Templates come from a [`QueryProvider`](crate::QueryProvider). A
//! placeholder is a colon followed by an identifier; `::` (as in a
//! PostgreSQL cast) does not start one. A name used several times binds
//! once.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::Result;
use crate::connection::Params;
use crate::error::BindingError;
use crate::value::Value;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[^:A-Za-z0-9_]):([A-Za-z_][A-Za-z0-9_]*)").expect("valid placeholder regex")
    })
}

/// Keywords a write statement must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `INSERT`
    Insert,
    /// `ON DUPLICATE KEY UPDATE`
    ConflictUpdate,
    /// `DELETE`
    Delete,
}

impl Marker {
    pub const fn keyword(self) -> &'static str {
        match self {
            Marker::Insert => "INSERT",
            Marker::ConflictUpdate => "ON DUPLICATE KEY UPDATE",
            Marker::Delete => "DELETE",
        }
    }

    fn regex(self) -> &'static Regex {
        static INSERT: OnceLock<Regex> = OnceLock::new();
        static UPDATE: OnceLock<Regex> = OnceLock::new();
        static DELETE: OnceLock<Regex> = OnceLock::new();
        match self {
            Marker::Insert => INSERT
                .get_or_init(|| Regex::new(r"(?i)\bINSERT\b").expect("valid marker regex")),
            Marker::ConflictUpdate => UPDATE.get_or_init(|| {
                Regex::new(r"(?i)\bON\s+DUPLICATE\s+KEY\s+UPDATE\b").expect("valid marker regex")
            }),
            Marker::Delete => DELETE
                .get_or_init(|| Regex::new(r"(?i)\bDELETE\b").expect("valid marker regex")),
        }
    }
}

/// A parsed query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    sql: String,
    placeholders: Vec<String>,
}

impl Template {
    pub fn parse(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let mut placeholders: Vec<String> = Vec::new();
        for caps in placeholder_regex().captures_iter(&sql) {
            let name = &caps[1];
            if !placeholders.iter().any(|p| p == name) {
                placeholders.push(name.to_string());
            }
        }
        Self { sql, placeholders }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholders.len()
    }

    pub fn placeholder_set(&self) -> BTreeSet<&str> {
        self.placeholders.iter().map(String::as_str).collect()
    }

    pub fn has_marker(&self, marker: Marker) -> bool {
        marker.regex().is_match(&self.sql)
    }

    /// Bind positional parameters to the placeholders in order.
    ///
    /// The parameter count must equal the placeholder count exactly.
    #[allow(clippy::result_large_err)]
    pub fn bind(&self, params: &[Value]) -> Result<Params> {
        if params.len() != self.placeholders.len() {
            return Err(BindingError {
                sql: self.sql.clone(),
                expected: self.placeholders.len(),
                supplied: params.len(),
            }
            .into());
        }
        Ok(self
            .placeholders
            .iter()
            .cloned()
            .zip(params.iter().cloned())
            .collect())
    }
}
