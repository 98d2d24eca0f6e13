// tests/integration_test.rs

//! End-to-end tests exercising the create/up/down lifecycle across modules.

use sqlbuns::dialect::Dialect;
use sqlbuns::differ::column::NonInteractiveOracle;
use sqlbuns::exec::{open_sqlite_memory, Introspector, SqliteExecutor, SqliteIntrospector};
use sqlbuns::migrate::{self, CreateOutcome, DownOutcome, UpOutcome};
use sqlbuns::model::{Field, FieldKind, FieldOptions, Model, ModelMeta, Relation, RelationKind, Schema, TriggerSlot};
use sqlbuns::ordered::OrderedMap;
use std::collections::HashMap;
use tempfile::tempdir;

fn pk_field() -> Field {
    Field::new(
        "id",
        FieldKind::Integer,
        FieldOptions {
            primary_key: true,
            auto_increment: true,
            ..Default::default()
        },
    )
    .unwrap()
}

fn users_schema() -> Schema {
    let email = Field::new("email", FieldKind::Text, FieldOptions { unique: true, ..Default::default() }).unwrap();
    let model = Model::new(
        "users",
        vec![("id".into(), pk_field()), ("email".into(), email)],
        vec![],
        HashMap::<TriggerSlot, sqlbuns::model::Trigger>::new(),
        ModelMeta::default(),
    )
    .unwrap();
    let mut models = OrderedMap::new();
    models.insert("users", model);
    Schema::new(models)
}

fn users_and_posts_schema() -> Schema {
    let mut schema = users_schema();
    let user_id = Field::new("user_id", FieldKind::Integer, FieldOptions::default()).unwrap();
    let rel = Relation::new(RelationKind::HasOne, "users", "user_id", None, None).unwrap();
    let posts = Model::new(
        "posts",
        vec![("id".into(), pk_field()), ("user_id".into(), user_id)],
        vec![("author".into(), rel)],
        HashMap::<TriggerSlot, sqlbuns::model::Trigger>::new(),
        ModelMeta::default(),
    )
    .unwrap();

    let mut models = OrderedMap::new();
    for (key, model) in schema.iter() {
        models.insert(key, model.clone());
    }
    models.insert("posts", posts);
    schema = Schema::new(models);
    sqlbuns::resolver::resolve(schema.models()).unwrap()
}

#[test]
fn full_lifecycle_creates_applies_and_rolls_back() {
    let conn = open_sqlite_memory().unwrap();
    let dir = tempdir().unwrap();
    let introspector = SqliteIntrospector::new(&conn);
    let executor = SqliteExecutor::new(&conn);

    let outcome = migrate::create(
        &conn,
        Dialect::Sqlite,
        dir.path(),
        &users_schema(),
        &introspector,
        &NonInteractiveOracle,
        "create users",
    )
    .unwrap();
    assert!(matches!(outcome, CreateOutcome::Created { .. }));

    assert!(!SqliteIntrospector::new(&conn).table_exists("users"));
    let up_outcome = migrate::up(&conn, &executor, dir.path()).unwrap();
    assert!(matches!(up_outcome, UpOutcome::Applied { .. }));
    assert!(SqliteIntrospector::new(&conn).table_exists("users"));
    assert!(SqliteIntrospector::new(&conn).column_exists("users", "email"));

    // A second table, linked to the first by a relation, diffs cleanly on
    // top of what's already live.
    let outcome = migrate::create(
        &conn,
        Dialect::Sqlite,
        dir.path(),
        &users_and_posts_schema(),
        &introspector,
        &NonInteractiveOracle,
        "add posts",
    )
    .unwrap();
    assert!(matches!(outcome, CreateOutcome::Created { .. }));
    migrate::up(&conn, &executor, dir.path()).unwrap();
    assert!(SqliteIntrospector::new(&conn).table_exists("posts"));

    // Rolling back reverts only the most recent migration.
    let down_outcome = migrate::down(&conn, &executor, dir.path()).unwrap();
    assert!(matches!(down_outcome, DownOutcome::RolledBack { .. }));
    assert!(!SqliteIntrospector::new(&conn).table_exists("posts"));
    assert!(SqliteIntrospector::new(&conn).table_exists("users"));

    let down_outcome = migrate::down(&conn, &executor, dir.path()).unwrap();
    assert!(matches!(down_outcome, DownOutcome::RolledBack { .. }));
    assert!(!SqliteIntrospector::new(&conn).table_exists("users"));

    assert!(matches!(
        migrate::down(&conn, &executor, dir.path()).unwrap(),
        DownOutcome::NothingToRollBack
    ));
}

#[test]
fn up_all_applies_every_pending_migration_in_order() {
    let conn = open_sqlite_memory().unwrap();
    let dir = tempdir().unwrap();
    let introspector = SqliteIntrospector::new(&conn);
    let executor = SqliteExecutor::new(&conn);

    migrate::create(&conn, Dialect::Sqlite, dir.path(), &users_schema(), &introspector, &NonInteractiveOracle, "first").unwrap();
    migrate::up(&conn, &executor, dir.path()).unwrap();
    migrate::create(
        &conn,
        Dialect::Sqlite,
        dir.path(),
        &users_and_posts_schema(),
        &introspector,
        &NonInteractiveOracle,
        "second",
    )
    .unwrap();

    // Nothing pending for `create` to see as "ahead" once `up` drains the
    // queue, and `up_all` on an already-applied tree is a no-op.
    let applied = migrate::up_all(&conn, &executor, dir.path()).unwrap();
    assert_eq!(applied.len(), 1);
    assert!(migrate::up_all(&conn, &executor, dir.path()).unwrap().is_empty());
}

#[test]
fn create_detects_drift_when_db_diverges_from_local_snapshot() {
    let conn = open_sqlite_memory().unwrap();
    let dir = tempdir().unwrap();
    let introspector = SqliteIntrospector::new(&conn);
    let executor = SqliteExecutor::new(&conn);

    migrate::create(&conn, Dialect::Sqlite, dir.path(), &users_schema(), &introspector, &NonInteractiveOracle, "first").unwrap();
    migrate::up(&conn, &executor, dir.path()).unwrap();

    // Simulate an out-of-band change to the database that the history table
    // doesn't know about: hand-edit the history row's checksum.
    conn.execute("UPDATE _sqlbuns_migrations SET checksum = 'deadbeef'", []).unwrap();

    let err = migrate::create(
        &conn,
        Dialect::Sqlite,
        dir.path(),
        &users_and_posts_schema(),
        &introspector,
        &NonInteractiveOracle,
        "second",
    )
    .unwrap_err();
    assert!(matches!(err, sqlbuns::Error::SchemaDrift { .. }));
}
