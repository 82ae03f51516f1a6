//! Shared fixtures: an in-memory connection that records every call, and a
//! few small domain types with their factories.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use datagate::prelude::*;
use datagate::{ConnectionError, ConnectionErrorKind};

// ============================================================================
// Recording connection
// ============================================================================

/// Statement handle: the SQL plus the id its pending result is filed under.
#[derive(Debug, Clone)]
pub struct MemoryStatement {
    id: u64,
    sql: String,
}

#[derive(Debug, Default)]
struct Calls {
    prepared: Vec<String>,
    executed: Vec<(String, Params)>,
}

/// Handle on the calls a [`MemoryConnection`] has seen, usable after the
/// connection moved into a gateway.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Calls>>,
}

impl CallLog {
    pub fn prepared(&self) -> Vec<String> {
        self.calls.lock().unwrap().prepared.clone()
    }

    pub fn executed(&self) -> Vec<(String, Params)> {
        self.calls.lock().unwrap().executed.clone()
    }

    pub fn executions(&self) -> usize {
        self.calls.lock().unwrap().executed.len()
    }

    /// Executions whose statement starts with `prefix`.
    pub fn executions_of(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .executed
            .iter()
            .filter(|(sql, _)| sql.starts_with(prefix))
            .count()
    }
}

/// A tiny table store answering the statements `TableQueryProvider`
/// generates.
///
/// Selects filter a table by equality on every bound parameter, inserts
/// upsert by `id`, deletes remove every row matching the parameters.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    tables: HashMap<String, Vec<Row>>,
    pending: HashMap<u64, VecDeque<Row>>,
    next_id: u64,
    fail_on: Option<String>,
    log: CallLog,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    /// Fail every execution whose statement contains `needle`.
    pub fn fail_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

fn table_of(sql: &str) -> Option<String> {
    let mut tokens = sql.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("FROM") || token.eq_ignore_ascii_case("INTO") {
            return tokens
                .next()
                .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string());
        }
    }
    None
}

fn matches(row: &Row, params: &Params) -> bool {
    params.iter().all(|(name, value)| row.get(name) == Some(value))
}

impl Connection for MemoryConnection {
    type Statement = MemoryStatement;

    fn prepare(&mut self, sql: &str) -> Result<MemoryStatement> {
        self.log.calls.lock().unwrap().prepared.push(sql.to_string());
        self.next_id += 1;
        Ok(MemoryStatement {
            id: self.next_id,
            sql: sql.to_string(),
        })
    }

    fn execute(&mut self, statement: &MemoryStatement, params: &Params) -> Result<()> {
        let sql = statement.sql.as_str();
        self.log
            .calls
            .lock()
            .unwrap()
            .executed
            .push((sql.to_string(), params.clone()));

        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(Error::Connection(ConnectionError {
                    kind: ConnectionErrorKind::Execute,
                    message: format!("refused: {sql}"),
                    source: None,
                }));
            }
        }

        let table = table_of(sql).unwrap_or_default();
        let rows = self.tables.entry(table).or_default();
        let verb = sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match verb.as_str() {
            "SELECT" => {
                let found = rows.iter().filter(|r| matches(r, params)).cloned().collect();
                self.pending.insert(statement.id, found);
            }
            "INSERT" => {
                let row = Row::from_pairs(params.iter().map(|(k, v)| (k, v.clone())));
                match rows.iter().position(|r| r.get("id") == row.get("id")) {
                    Some(pos) => rows[pos] = row,
                    None => rows.push(row),
                }
            }
            "DELETE" => rows.retain(|r| !matches(r, params)),
            other => return Err(Error::Custom(format!("unsupported statement {other}"))),
        }
        Ok(())
    }

    fn fetch_one(&mut self, statement: &MemoryStatement) -> Result<Option<Row>> {
        Ok(self
            .pending
            .get_mut(&statement.id)
            .and_then(VecDeque::pop_front))
    }

    fn fetch_all(&mut self, statement: &MemoryStatement) -> Result<Vec<Row>> {
        Ok(self
            .pending
            .remove(&statement.id)
            .map(Vec::from)
            .unwrap_or_default())
    }
}

// ============================================================================
// Domain types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
}

impl User {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

pub fn user_row(id: i64, name: &str) -> Row {
    Row::from_pairs([("id", Value::Int(id)), ("name", Value::from(name))])
}

pub fn user_factory() -> FnFactory<User> {
    FnFactory::new(
        |row| {
            Ok(User {
                id: row.get_named("id")?,
                name: row.get_named("name")?,
            })
        },
        |user: &User| Ok(user_row(user.id, &user.name)),
    )
}

pub fn user_provider() -> TableQueryProvider {
    TableQueryProvider::for_type::<User>("users")
        .single("byName", "SELECT * FROM users WHERE name = :name")
        .many("allNamed", "SELECT * FROM users WHERE name = :name")
}

#[derive(Debug)]
pub struct Book {
    pub id: i64,
    pub title: String,
}

pub fn book_factory() -> FnFactory<Book> {
    FnFactory::new(
        |row| {
            Ok(Book {
                id: row.get_named("id")?,
                title: row.get_named("title")?,
            })
        },
        |book: &Book| {
            Ok(Row::from_pairs([
                ("id", Value::Int(book.id)),
                ("title", Value::from(book.title.as_str())),
            ]))
        },
    )
}

#[derive(Debug)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub books: Vec<Object>,
    pub editor: Option<Object>,
}

pub fn author_factory() -> FnFactory<Author> {
    FnFactory::new(
        |row| {
            Ok(Author {
                id: row.get_named("id")?,
                name: row.get_named("name")?,
                books: Vec::new(),
                editor: None,
            })
        },
        |author: &Author| {
            Ok(Row::from_pairs([
                ("id", Value::Int(author.id)),
                ("name", Value::from(author.name.as_str())),
            ]))
        },
    )
    .with_related("books", |author: &Author| Related::Many(author.books.clone()))
    .with_related("editor", |author: &Author| match &author.editor {
        Some(editor) => Related::One(editor.clone()),
        None => Related::None,
    })
}

/// Wraps a factory and counts calls to `build`.
pub struct Counting<F> {
    inner: F,
    builds: Arc<AtomicUsize>,
}

impl<F: Factory> Counting<F> {
    pub fn new(inner: F) -> (Self, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                builds: Arc::clone(&builds),
            },
            builds,
        )
    }
}

impl<F: Factory> Factory for Counting<F> {
    fn approve_class(&self, class: &TypeKey) -> bool {
        self.inner.approve_class(class)
    }

    fn build(&self, row: &Row) -> Result<Object> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.build(row)
    }

    fn dismantle(&self, object: &Object) -> Result<Row> {
        self.inner.dismantle(object)
    }

    fn related(&self, object: &Object, accessor: &str) -> Result<Related> {
        self.inner.related(object, accessor)
    }
}

/// A gateway over a `users` table holding `rows`, with `User` registered.
pub fn user_gateway(rows: Vec<Row>) -> (Gateway<MemoryConnection>, CallLog) {
    let conn = MemoryConnection::new().with_table("users", rows);
    let log = conn.log();
    let gateway = GatewayBuilder::new().build_with(conn);
    gateway
        .add_type::<User>(user_factory(), user_provider(), DEFAULT_KEY_FIELDS)
        .unwrap();
    (gateway, log)
}
