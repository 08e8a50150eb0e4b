use markdeck_core::db::migrations::{current_version, latest_version};
use markdeck_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const DECK_TABLES: [&str; 4] = ["notes", "note_fields", "note_tags", "cards"];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(current_version(&conn).unwrap(), latest_version());
    for table in DECK_TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_a_deck_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deck.db");

    let first = open_db(&path).unwrap();
    first
        .execute(
            "INSERT INTO notes (model, deck, mod_time) VALUES ('Pocket Article', 'Articles', 1);",
            [],
        )
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(current_version(&second).unwrap(), latest_version());
    let notes: i64 = second
        .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(notes, 1);
}

#[test]
fn pending_migrations_are_applied_on_top_of_an_older_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    drop(conn);

    let upgraded = open_db(&path).unwrap();
    assert_eq!(current_version(&upgraded).unwrap(), latest_version());
    assert_table_exists(&upgraded, "note_tags");
}

#[test]
fn opening_a_deck_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
