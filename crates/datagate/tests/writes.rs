mod common;

use std::sync::Arc;

use common::{
    Author, Book, MemoryConnection, User, author_factory, book_factory, user_factory, user_gateway,
    user_provider, user_row,
};
use datagate::prelude::*;
use datagate::{LookupErrorKind, RegistrationErrorKind, StatementErrorKind, TemplateMap};

/// Table statements with the write templates replaced.
struct Overriding {
    inner: TableQueryProvider,
    upsert: Option<&'static str>,
    delete: Option<&'static str>,
    single: Option<TemplateMap>,
}

impl QueryProvider for Overriding {
    fn approve_class(&self, class: &TypeKey) -> bool {
        self.inner.approve_class(class)
    }

    fn single_select_templates(&self, key_fields: &[String]) -> Result<TemplateMap> {
        match &self.single {
            Some(map) => Ok(map.clone()),
            None => self.inner.single_select_templates(key_fields),
        }
    }

    fn multi_select_templates(&self, key_fields: &[String]) -> Result<TemplateMap> {
        self.inner.multi_select_templates(key_fields)
    }

    fn upsert_template(&self, key_fields: &[String], all_fields: &[String]) -> Result<String> {
        match self.upsert {
            Some(sql) => Ok(sql.to_string()),
            None => self.inner.upsert_template(key_fields, all_fields),
        }
    }

    fn delete_template(&self, key_fields: &[String]) -> Result<String> {
        match self.delete {
            Some(sql) => Ok(sql.to_string()),
            None => self.inner.delete_template(key_fields),
        }
    }
}

fn overriding_gateway(
    upsert: Option<&'static str>,
    delete: Option<&'static str>,
) -> (Gateway<MemoryConnection>, common::CallLog) {
    gateway_with(Overriding {
        inner: user_provider(),
        upsert,
        delete,
        single: None,
    })
}

fn gateway_with(provider: Overriding) -> (Gateway<MemoryConnection>, common::CallLog) {
    let conn = MemoryConnection::new();
    let log = conn.log();
    let gateway = GatewayBuilder::new().build_with(conn);
    gateway
        .add_type::<User>(user_factory(), provider, DEFAULT_KEY_FIELDS)
        .unwrap();
    (gateway, log)
}

#[test]
fn upsert_without_insert_marker_is_rejected() {
    let (gateway, log) = overriding_gateway(
        Some("UPDATE users SET name = :name WHERE id = :id ON DUPLICATE KEY UPDATE name = :name"),
        None,
    );
    match gateway.save(&Object::new(User::new(1, "x")), &[]) {
        Err(Error::Statement(e)) => {
            assert_eq!(e.kind, StatementErrorKind::MissingMarker);
            assert_eq!(e.marker, Some("INSERT"));
        }
        other => panic!("expected missing marker, got {other:?}"),
    }
    assert_eq!(log.executions(), 0);
}

#[test]
fn upsert_must_bind_every_field() {
    let (gateway, log) = overriding_gateway(
        Some("INSERT INTO users (id) VALUES (:id) ON DUPLICATE KEY UPDATE id = id"),
        None,
    );
    match gateway.save(&Object::new(User::new(1, "x")), &[]) {
        Err(Error::Statement(e)) => {
            assert_eq!(e.kind, StatementErrorKind::KeysMismatch);
            assert!(e.missing.is_empty());
            assert_eq!(e.unexpected, vec!["name".to_string()]);
        }
        other => panic!("expected keys mismatch, got {other:?}"),
    }
    assert_eq!(log.executions(), 0);
}

#[test]
fn delete_must_bind_only_the_key() {
    let (gateway, log) =
        overriding_gateway(None, Some("DELETE FROM users WHERE id = :id AND name = :name"));
    match gateway.delete(&Object::new(User::new(1, "x"))) {
        Err(Error::Statement(e)) => {
            assert_eq!(e.kind, StatementErrorKind::KeysMismatch);
            assert_eq!(e.missing, vec!["name".to_string()]);
            assert!(e.unexpected.is_empty());
        }
        other => panic!("expected keys mismatch, got {other:?}"),
    }
    assert_eq!(log.executions(), 0);
}

#[test]
fn malformed_select_map_fails_the_save_before_writing() {
    let (gateway, log) = gateway_with(Overriding {
        inner: user_provider(),
        upsert: None,
        delete: None,
        single: Some(TemplateMap::from([("single".to_string(), "   ".to_string())])),
    });
    let user = Object::new(User::new(1, "x"));

    match gateway.save(&user, &[]) {
        Err(Error::Lookup(e)) => assert_eq!(e.kind, LookupErrorKind::MalformedQueryMap),
        other => panic!("expected malformed query map, got {other:?}"),
    }
    assert_eq!(log.executions(), 0);
    let class = TypeKey::of::<User>();
    assert!(gateway.cached_row(&class, &user_row(1, "x")).is_none());
}

#[test]
fn save_loads_select_statements_and_stores_the_row() {
    let (gateway, log) = user_gateway(Vec::new());
    let class = TypeKey::of::<User>();
    assert!(!gateway.statements_loaded(&class).unwrap());

    gateway.save(&Object::new(User::new(1, "x")), &[]).unwrap();
    assert!(gateway.statements_loaded(&class).unwrap());
    assert_eq!(log.executions(), 1);

    let key_only = Row::from_pairs([("id", Value::Int(1))]);
    let stored = gateway.cached_row(&class, &key_only).unwrap();
    assert_eq!(stored, user_row(1, "x"));
}

#[test]
fn saves_always_reach_the_connection() {
    let (gateway, log) = user_gateway(Vec::new());
    let user = Object::new(User::new(1, "x"));

    gateway.save(&user, &[]).unwrap();
    gateway.save(&user, &[]).unwrap();
    assert_eq!(log.executions_of("INSERT"), 2);
    // One prepared statement serves both.
    assert_eq!(log.prepared().len(), 1);
    assert_eq!(gateway.stats().round_trips, 2);
}

#[test]
fn save_replaces_the_canonical_object() {
    let (gateway, log) = user_gateway(vec![user_row(1, "ann")]);
    let ann = gateway.fetch::<User>(&[Value::Int(1)]).unwrap();
    assert_eq!(ann.name, "ann");

    let renamed = Object::new(User::new(1, "anna"));
    gateway.save(&renamed, &[]).unwrap();
    assert_eq!(log.executions(), 2);

    let fetched = gateway.fetch::<User>(&[Value::Int(1)]).unwrap();
    assert!(Arc::ptr_eq(&fetched, &renamed.downcast::<User>().unwrap()));
    assert_eq!(fetched.name, "anna");
    assert_eq!(log.executions(), 2);

    // A fresh multi-row read resolves the row to the saved object too.
    let users = gateway.fetch_all::<User>(&[]).unwrap();
    assert!(users.get(0).unwrap().ptr_eq(&renamed));
    assert_eq!(log.executions(), 3);
}

#[test]
fn saving_an_unregistered_type_fails() {
    let (gateway, log) = user_gateway(Vec::new());
    let book = Object::new(Book {
        id: 1,
        title: "Dune".to_string(),
    });
    match gateway.save(&book, &[]) {
        Err(Error::Registration(e)) => assert_eq!(e.kind, RegistrationErrorKind::NotRegistered),
        other => panic!("expected not registered, got {other:?}"),
    }
    assert!(gateway.delete(&book).is_err());
    assert_eq!(log.executions(), 0);
}

fn library() -> (Gateway<MemoryConnection>, common::CallLog) {
    let (gateway, log) = user_gateway(Vec::new());
    gateway
        .add_type::<Book>(
            book_factory(),
            TableQueryProvider::for_type::<Book>("books"),
            DEFAULT_KEY_FIELDS,
        )
        .unwrap();
    gateway
        .add_type::<Author>(
            author_factory(),
            TableQueryProvider::for_type::<Author>("authors"),
            DEFAULT_KEY_FIELDS,
        )
        .unwrap();
    (gateway, log)
}

fn book(id: i64, title: &str) -> Object {
    Object::new(Book {
        id,
        title: title.to_string(),
    })
}

#[test]
fn nested_save_follows_accessors() {
    let (gateway, log) = library();
    let dune = book(1, "Dune");
    let messiah = book(2, "Dune Messiah");
    let editor = Object::new(User::new(7, "ed"));
    let author = Object::new(Author {
        id: 1,
        name: "Frank".to_string(),
        books: vec![dune, messiah.clone()],
        editor: Some(editor.clone()),
    });

    gateway.save(&author, &["books", "editor"]).unwrap();

    let statements: Vec<String> = log.executed().into_iter().map(|(sql, _)| sql).collect();
    assert_eq!(statements.len(), 4);
    assert!(statements[0].starts_with("INSERT INTO authors"));
    assert!(statements[1].starts_with("INSERT INTO books"));
    assert!(statements[2].starts_with("INSERT INTO books"));
    assert!(statements[3].starts_with("INSERT INTO users"));

    // Saved objects are canonical without another round trip.
    let fetched = gateway.fetch::<Book>(&[Value::Int(2)]).unwrap();
    assert!(Arc::ptr_eq(&fetched, &messiah.downcast::<Book>().unwrap()));
    let fetched = gateway.fetch::<User>(&[Value::Int(7)]).unwrap();
    assert!(Arc::ptr_eq(&fetched, &editor.downcast::<User>().unwrap()));
    assert_eq!(log.executions(), 4);
}

#[test]
fn nested_save_skips_empty_relations() {
    let (gateway, log) = library();
    let author = Object::new(Author {
        id: 2,
        name: "Ursula".to_string(),
        books: Vec::new(),
        editor: None,
    });
    gateway.save(&author, &["books", "editor"]).unwrap();
    assert_eq!(log.executions(), 1);
}

#[test]
fn nested_save_with_unknown_accessor() {
    let (gateway, _) = library();
    let author = Object::new(Author {
        id: 3,
        name: "Iain".to_string(),
        books: vec![book(9, "Excession")],
        editor: None,
    });
    match gateway.save(&author, &["books", "reviews"]) {
        Err(Error::Lookup(e)) => {
            assert_eq!(e.kind, LookupErrorKind::UnknownAccessor);
            assert_eq!(e.name, "reviews");
        }
        other => panic!("expected unknown accessor, got {other:?}"),
    }

    // Factories without accessors reject every name.
    match gateway.save(&book(9, "Excession"), &["author"]) {
        Err(Error::Lookup(e)) => assert_eq!(e.kind, LookupErrorKind::UnknownAccessor),
        other => panic!("expected unknown accessor, got {other:?}"),
    }
}

#[test]
fn delete_binds_the_key_and_keeps_the_identity_map() {
    let (gateway, log) = user_gateway(vec![user_row(1, "ann"), user_row(2, "bob")]);
    let ann = gateway.fetch::<User>(&[Value::Int(1)]).unwrap();
    let ann_obj = Object::from_arc(Arc::clone(&ann));

    gateway.delete(&ann_obj).unwrap();
    let (sql, params) = log.executed().pop().unwrap();
    assert_eq!(sql, "DELETE FROM users WHERE id = :id");
    assert_eq!(params.len(), 1);
    assert_eq!(params.get("id"), Some(&Value::Int(1)));

    // The memoized fetch and the identity entry both survive.
    let again = gateway.fetch::<User>(&[Value::Int(1)]).unwrap();
    assert!(Arc::ptr_eq(&ann, &again));
    let class = TypeKey::of::<User>();
    assert!(gateway.get_object(&class, &user_row(1, "ann")).unwrap().ptr_eq(&ann_obj));

    // Deletes are never memoized.
    gateway.delete(&ann_obj).unwrap();
    assert_eq!(log.executions_of("DELETE"), 2);

    // The row is gone from the backend.
    let users = gateway.fetch_all::<User>(&[]).unwrap();
    assert_eq!(users.count(), 1);
    assert_eq!(users.get_as::<User>(0).unwrap().id, 2);
}
