// src/exec.rs

//! The connection-pool and introspection surfaces spec.md §6 scopes out of
//! the core ("the host database connection pool... database introspection
//! for bootstrap") but that C5/C7/C8 still need to *consume* through a
//! narrow interface. `Executor`/`Introspector` are that interface; this
//! module also ships the one concrete implementation the crate bundles —
//! SQLite, via `rusqlite`, matching the teacher's own storage layer.
//! Postgres/MySQL get full `Dialect` code generation (src/dialect.rs) but no
//! bundled executor: wiring a real pool for those is an integrator's job.

use crate::error::Result;
use rusqlite::Connection;

/// The transactional boundary C7 applies a migration artifact through.
pub trait Executor {
    /// Run the whole file as one script (spec.md §6: CREATE TRIGGER bodies
    /// are multi-line and must survive naive statement splitting).
    fn execute_script(&self, sql: &str) -> Result<()>;
    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

/// Read-only probes the differ (C5) and trigger validator (C8) use to
/// decide `createNow` vs `defer` vs `error`, and the SQLite rebuild policy
/// (C3) uses to check for external references. Lookup failures are
/// swallowed as "no"/empty, per spec.md §6.
pub trait Introspector {
    fn table_exists(&self, table: &str) -> bool;
    fn column_exists(&self, table: &str, column: &str) -> bool;
    fn index_names(&self, table: &str) -> Vec<String>;
    /// Tables whose DDL contains `REFERENCES <table>` (substring match,
    /// intentionally conservative — spec.md §4.3/§9).
    fn referencing_tables(&self, table: &str) -> Vec<String>;
    /// `(trigger_name, body)` for every trigger in the database, for the
    /// rebuild policy's "does any trigger mention this table" check.
    fn trigger_bodies(&self) -> Vec<(String, String)>;
}

/// The bundled SQLite executor/introspector, sharing one connection the way
/// the teacher's `db::open` does (WAL + foreign key pragmas).
pub struct SqliteExecutor<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteExecutor<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl Executor for SqliteExecutor<'_> {
    fn execute_script(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION;")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }
}

pub struct SqliteIntrospector<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteIntrospector<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl Introspector for SqliteIntrospector<'_> {
    fn table_exists(&self, table: &str) -> bool {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .is_ok()
    }

    fn column_exists(&self, table: &str, column: &str) -> bool {
        let Ok(mut stmt) = self.conn.prepare(&format!("PRAGMA table_info({table})")) else {
            return false;
        };
        let Ok(mut rows) = stmt.query([]) else {
            return false;
        };
        while let Ok(Some(row)) = rows.next() {
            let name: String = row.get(1).unwrap_or_default();
            if name == column {
                return true;
            }
        }
        false
    }

    fn index_names(&self, table: &str) -> Vec<String> {
        let Ok(mut stmt) = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name = ?1")
        else {
            return Vec::new();
        };
        stmt.query_map([table], |row| row.get::<_, String>(0))
            .map(|rows| rows.filter_map(std::result::Result::ok).collect())
            .unwrap_or_default()
    }

    fn referencing_tables(&self, table: &str) -> Vec<String> {
        let Ok(mut stmt) = self
            .conn
            .prepare("SELECT name, sql FROM sqlite_master WHERE type='table' AND name != ?1")
        else {
            return Vec::new();
        };
        let needle = format!("REFERENCES {table}");
        let needle_quoted = format!("REFERENCES \"{table}\"");
        stmt.query_map([table], |row| {
            let name: String = row.get(0)?;
            let sql: Option<String> = row.get(1)?;
            Ok((name, sql))
        })
        .map(|rows| {
            rows.filter_map(std::result::Result::ok)
                .filter(|(_, sql)| {
                    sql.as_deref()
                        .map(|s| s.contains(&needle) || s.contains(&needle_quoted))
                        .unwrap_or(false)
                })
                .map(|(name, _)| name)
                .collect()
        })
        .unwrap_or_default()
    }

    fn trigger_bodies(&self) -> Vec<(String, String)> {
        let Ok(mut stmt) = self
            .conn
            .prepare("SELECT name, sql FROM sqlite_master WHERE type='trigger'")
        else {
            return Vec::new();
        };
        stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let sql: Option<String> = row.get(1)?;
            Ok((name, sql.unwrap_or_default()))
        })
        .map(|rows| rows.filter_map(std::result::Result::ok).collect())
        .unwrap_or_default()
    }
}

/// `DATABASE_ENGINE` dispatch helper: open a SQLite connection with the
/// teacher's pragma setup (foreign keys on, busy timeout, WAL for a live
/// file). Postgres/MySQL are recognized by `Dialect` but have no bundled
/// connection here (see module docs).
pub fn open_sqlite(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;
    Ok(conn)
}

pub fn open_sqlite_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}
