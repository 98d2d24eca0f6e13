// src/error.rs

use thiserror::Error;

/// Core error types for sqlbuns
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Canonical-JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Structural schema violation: empty enum, composite PK with
    /// auto-increment, a relation target missing from both the database and
    /// the current batch, etc.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Field construction failed validation.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Relation construction failed validation.
    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    /// Trigger construction or body validation failed.
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// The relation graph contains a cycle; carries the cycle's node path.
    #[error("Cyclic schema: {}", .0.join(" -> "))]
    CyclicSchema(Vec<String>),

    /// Migration files exist on disk that are not yet recorded in history.
    #[error("{0} unapplied migration(s) on disk; run `up` before `create`")]
    LocalAhead(usize),

    /// The history table's last-applied checksum disagrees with the local
    /// snapshot's checksum: the database was modified outside this tool.
    #[error("Schema drift detected: database last migrated at checksum {db}, local snapshot hashes to {local}")]
    SchemaDrift { db: String, local: String },

    /// A DDL statement failed while applying an artifact during `up`/`down`.
    #[error("Failed to apply migration '{name}': {source}")]
    ApplyFailed {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    /// `DATABASE_ENGINE` missing or not one of postgres/mysql/sqlite.
    #[error("Unsupported or missing DATABASE_ENGINE: {0}")]
    DialectUnsupported(String),

    /// SQLite rebuild was blocked by an external reference to the table
    /// being rebuilt.
    #[error("Rebuild of table '{table}' blocked: {reason}")]
    RebuildBlocked { table: String, reason: String },

    /// Generic not-yet-implemented external collaborator (e.g. `inspectdb`,
    /// which is explicitly out of core scope).
    #[error("{0} is not implemented by the core engine")]
    NotImplemented(&'static str),
}

/// Result type alias using sqlbuns's Error type
pub type Result<T> = std::result::Result<T, Error>;
