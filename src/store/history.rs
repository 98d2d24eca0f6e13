// src/store/history.rs

//! The `_sqlbuns_migrations` history table (part of C6, spec.md §4.6/§6).
//!
//! This talks to `rusqlite::Connection` directly rather than through the
//! `Executor`/`Introspector` traits in `crate::exec`: those traits expose
//! only the narrow surface C5/C7/C8 need (run a script, probe for a table or
//! column), not the row-level reads/writes the history table requires. The
//! history table is SQLite-only here for the same reason `exec.rs` bundles
//! only a SQLite executor — Postgres/MySQL wiring is an integrator's job.

use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub id: i64,
    pub name: String,
    pub checksum: String,
    pub previous_checksum: Option<String>,
    pub direction: String,
    pub applied_at: String,
    pub rolled_back: bool,
    pub rolled_back_at: Option<String>,
}

/// Create the history table on first contact. SQLite's UNIQUE constraint on
/// `name` already creates an implicit index, so no separate `CREATE INDEX`
/// is needed here (spec.md §4.6 asks for one only "on dialects where it is
/// distinct from the unique constraint" — SQLite is not one of those).
pub fn ensure_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _sqlbuns_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            checksum TEXT NOT NULL,
            previous_checksum TEXT,
            direction TEXT NOT NULL CHECK(direction IN ('up','down')) DEFAULT 'up',
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            rolled_back INTEGER NOT NULL DEFAULT 0,
            rolled_back_at TEXT
        );",
    )?;
    Ok(())
}

/// Names with `direction='up' AND rolled_back=false` — the applied set
/// `create`/`up` subtract on-disk artifacts against (spec.md §4.7).
pub fn applied_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM _sqlbuns_migrations WHERE direction = 'up' AND rolled_back = 0",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

/// The most recent `direction='up' AND rolled_back=false` row, used by
/// drift detection (spec.md §4.7) and `down`.
pub fn last_up_row(conn: &Connection) -> Result<Option<HistoryRow>> {
    conn.query_row(
        "SELECT id, name, checksum, previous_checksum, direction, applied_at, rolled_back, rolled_back_at
         FROM _sqlbuns_migrations
         WHERE direction = 'up' AND rolled_back = 0
         ORDER BY id DESC LIMIT 1",
        [],
        row_to_history,
    )
    .optional()
    .map_err(Into::into)
}

fn row_to_history(row: &rusqlite::Row) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        checksum: row.get(2)?,
        previous_checksum: row.get(3)?,
        direction: row.get(4)?,
        applied_at: row.get(5)?,
        rolled_back: row.get::<_, i64>(6)? != 0,
        rolled_back_at: row.get(7)?,
    })
}

/// Record a newly applied migration. Intended to run inside the same
/// transaction as the DDL it records (spec.md §3 "A history row is inserted
/// within the same transaction as the DDL it records").
pub fn insert_applied(conn: &Connection, name: &str, checksum: &str, previous_checksum: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO _sqlbuns_migrations (name, checksum, previous_checksum, direction, applied_at)
         VALUES (?1, ?2, ?3, 'up', ?4)",
        params![name, checksum, previous_checksum, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Mark the given migration rolled back, within the same transaction as its
/// reverse DDL (spec.md §4.7 `down`).
pub fn mark_rolled_back(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "UPDATE _sqlbuns_migrations SET rolled_back = 1, rolled_back_at = ?2 WHERE name = ?1",
        params![name, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::open_sqlite_memory;

    #[test]
    fn ensure_table_is_idempotent() {
        let conn = open_sqlite_memory().unwrap();
        ensure_table(&conn).unwrap();
        ensure_table(&conn).unwrap();
    }

    #[test]
    fn applied_names_excludes_rolled_back_and_down_rows() {
        let conn = open_sqlite_memory().unwrap();
        ensure_table(&conn).unwrap();
        insert_applied(&conn, "1_init", "aaa", None).unwrap();
        insert_applied(&conn, "2_second", "bbb", Some("aaa")).unwrap();
        mark_rolled_back(&conn, "2_second").unwrap();

        let names = applied_names(&conn).unwrap();
        assert_eq!(names, vec!["1_init".to_string()]);
    }

    #[test]
    fn last_up_row_reflects_most_recent_unrolled_back_migration() {
        let conn = open_sqlite_memory().unwrap();
        ensure_table(&conn).unwrap();
        assert!(last_up_row(&conn).unwrap().is_none());

        insert_applied(&conn, "1_init", "aaa", None).unwrap();
        insert_applied(&conn, "2_second", "bbb", Some("aaa")).unwrap();

        let last = last_up_row(&conn).unwrap().unwrap();
        assert_eq!(last.name, "2_second");
        assert_eq!(last.checksum, "bbb");
        assert!(!last.rolled_back);
    }

    #[test]
    fn name_uniqueness_is_enforced() {
        let conn = open_sqlite_memory().unwrap();
        ensure_table(&conn).unwrap();
        insert_applied(&conn, "1_init", "aaa", None).unwrap();
        let err = insert_applied(&conn, "1_init", "zzz", None);
        assert!(err.is_err());
    }
}
