// src/config.rs

//! Configuration surface (ambient stack, SPEC_FULL.md §2): `DATABASE_ENGINE`
//! plus the configured paths of spec.md §6. The host's model-authoring
//! surface and connection pool are external collaborators (spec.md §1), so
//! this only resolves what the engine itself needs: which dialect, and
//! where migrations/snapshot/models live on disk.

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_MIGRATIONS_DIR: &str = "database/migrations";
const DEFAULT_MODELS_PATH: &str = "database/models/index.json";
const DEFAULT_SQLITE_PATH: &str = "database/app.sqlite3";

#[derive(Debug, Clone)]
pub struct Config {
    pub dialect: Dialect,
    pub migrations_dir: PathBuf,
    pub snapshot_path: PathBuf,
    /// Where the host's exported model set lives. The crate has no
    /// field-constructor DSL of its own (spec.md §1 scopes model authoring
    /// out of core), so the CLI expects this file already in the canonical
    /// view shape `Schema::from_canonical_view` accepts — one entry per
    /// model, same shape as `schema_snapshot.json`.
    pub models_path: PathBuf,
    /// SQLite-only: the file the bundled executor opens. Unused for
    /// Postgres/MySQL, where connecting is an integrator's job (spec.md §6).
    pub sqlite_path: String,
}

impl Config {
    /// Resolve from the environment, following spec.md §6's precedence:
    /// `DATABASE_ENGINE` is required; paths fall back to the conventional
    /// `<cwd>/database/...` layout when not overridden.
    pub fn from_env() -> Result<Self> {
        let engine = env::var("DATABASE_ENGINE").map_err(|_| Error::DialectUnsupported("not set".to_string()))?;
        let dialect = Dialect::from_env_str(&engine)?;

        let migrations_dir = env::var("SQLBUNS_MIGRATIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MIGRATIONS_DIR));
        let models_path = env::var("SQLBUNS_MODELS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODELS_PATH));
        let sqlite_path = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_SQLITE_PATH.to_string());
        let snapshot_path = crate::store::artifact::snapshot_path(&migrations_dir);

        Ok(Self {
            dialect,
            migrations_dir,
            snapshot_path,
            models_path,
            sqlite_path,
        })
    }
}
