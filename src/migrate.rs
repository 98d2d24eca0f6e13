// src/migrate.rs

//! Migration Lifecycle (C7): `create` / `up` / `down`, drift detection, and
//! transactional apply (spec.md §4.7).

use crate::dialect::Dialect;
use crate::differ::{self, column::RenameOracle};
use crate::error::{Error, Result};
use crate::exec::{Executor, Introspector};
use crate::model::Schema;
use crate::store::{artifact, history, snapshot};
use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum CreateOutcome {
    /// The current schema hashes identically to the last recorded snapshot;
    /// nothing was written (spec.md §4.7: "If equal, exit with 'no changes'").
    NoChanges,
    Created { stem: String, warnings: Vec<String> },
}

/// `create(name)` (spec.md §4.7). `current_schema` is the already-loaded,
/// already-topologically-sorted schema the host program hands in — loading
/// it from the host's model set is the external collaborator spec.md §6
/// names, not this crate's job.
pub fn create(
    conn: &Connection,
    dialect: Dialect,
    migrations_dir: &Path,
    current_schema: &Schema,
    introspector: &dyn Introspector,
    oracle: &dyn RenameOracle,
    name: &str,
) -> Result<CreateOutcome> {
    std::fs::create_dir_all(migrations_dir)?;
    history::ensure_table(conn)?;

    let snapshot_path = artifact::snapshot_path(migrations_dir);
    let old_schema = snapshot::read(&snapshot_path)?.unwrap_or_default();

    let (old_sum, current_sum) = Schema::prechecksum_checksums(&old_schema, current_schema)?;
    if old_sum == current_sum {
        info!("schema unchanged since last snapshot, nothing to create");
        return Ok(CreateOutcome::NoChanges);
    }

    let on_disk = artifact::list_stems(migrations_dir)?;
    let applied = history::applied_names(conn)?;
    let unapplied = on_disk.iter().filter(|s| !applied.contains(s)).count();
    if unapplied > 0 {
        return Err(Error::LocalAhead(unapplied));
    }

    if let Some(last) = history::last_up_row(conn)? {
        let local_sum = old_schema.checksum()?;
        if last.checksum != local_sum {
            let would_be = differ::diff(dialect, &old_schema, current_schema, introspector, oracle)?;
            warn!(
                "schema drift detected: database recorded checksum {}, local snapshot hashes to {} -- reconstructed diff: {:?}",
                last.checksum, local_sum, would_be.forward
            );
            return Err(Error::SchemaDrift {
                db: last.checksum,
                local: local_sum,
            });
        }
    }

    let diff = differ::diff(dialect, &old_schema, current_schema, introspector, oracle)?;
    for warning in &diff.warnings {
        warn!("{warning}");
    }

    let now_ms = Utc::now().timestamp_millis();
    let stem = artifact::stem(now_ms, name);
    let forward_sql = format!("{}\n", diff.forward.join("\n"));
    let reverse_sql = format!("{}\n", diff.reverse.join("\n"));
    artifact::write(migrations_dir, &stem, &forward_sql, &reverse_sql, &current_sum)?;
    snapshot::write(&snapshot_path, current_schema)?;

    info!("wrote migration '{stem}' ({} forward statement(s))", diff.forward.len());
    Ok(CreateOutcome::Created {
        stem,
        warnings: diff.warnings,
    })
}

#[derive(Debug)]
pub enum UpOutcome {
    NoPending,
    Applied { name: String },
}

/// Apply at most one pending migration (SPEC_FULL.md Open Question decision
/// #1: the literal reading of spec.md §4.7's `up`).
pub fn up(conn: &Connection, executor: &dyn Executor, migrations_dir: &Path) -> Result<UpOutcome> {
    history::ensure_table(conn)?;
    let on_disk = artifact::list_stems(migrations_dir)?;
    let applied = history::applied_names(conn)?;
    let Some(stem) = on_disk.into_iter().find(|s| !applied.contains(s)) else {
        info!("no pending migrations");
        return Ok(UpOutcome::NoPending);
    };

    apply_one(conn, executor, migrations_dir, &stem)?;
    Ok(UpOutcome::Applied { name: stem })
}

/// Apply every pending migration in order, for convenience (SPEC_FULL.md
/// Open Question decision #1). Stops and surfaces the error at the first
/// failing file; earlier files stay committed (spec.md §7).
pub fn up_all(conn: &Connection, executor: &dyn Executor, migrations_dir: &Path) -> Result<Vec<String>> {
    let mut applied_this_run = Vec::new();
    loop {
        match up(conn, executor, migrations_dir)? {
            UpOutcome::NoPending => break,
            UpOutcome::Applied { name } => applied_this_run.push(name),
        }
    }
    Ok(applied_this_run)
}

fn apply_one(conn: &Connection, executor: &dyn Executor, migrations_dir: &Path, stem: &str) -> Result<()> {
    debug!("applying migration '{stem}'");
    let forward_sql = artifact::read_forward(migrations_dir, stem)?;

    // Each migration's own target checksum travels with its artifact
    // (written at `create` time) rather than being re-derived from
    // `schema_snapshot.json`, which is overwritten on every `create` and so
    // only ever reflects the latest one's target once more than one
    // migration is pending.
    let current_checksum = artifact::read_checksum(migrations_dir, stem)?;
    let previous_checksum = history::last_up_row(conn)?.map(|row| row.checksum);

    executor.begin()?;
    if let Err(e) = executor.execute_script(&forward_sql) {
        executor.rollback()?;
        return Err(apply_failed(stem, e));
    }
    if let Err(e) = history::insert_applied(conn, stem, &current_checksum, previous_checksum.as_deref()) {
        executor.rollback()?;
        return Err(e);
    }
    executor.commit()?;
    info!("applied migration '{stem}'");
    Ok(())
}

#[derive(Debug)]
pub enum DownOutcome {
    NothingToRollBack,
    RolledBack { name: String },
}

/// Revert the latest applied migration (spec.md §4.7 `down`).
pub fn down(conn: &Connection, executor: &dyn Executor, migrations_dir: &Path) -> Result<DownOutcome> {
    history::ensure_table(conn)?;
    let Some(last) = history::last_up_row(conn)? else {
        info!("no applied migrations to roll back");
        return Ok(DownOutcome::NothingToRollBack);
    };

    debug!("rolling back migration '{}'", last.name);
    let reverse_sql = artifact::read_reverse(migrations_dir, &last.name)?;

    executor.begin()?;
    if let Err(e) = executor.execute_script(&reverse_sql) {
        executor.rollback()?;
        return Err(apply_failed(&last.name, e));
    }
    if let Err(e) = history::mark_rolled_back(conn, &last.name) {
        executor.rollback()?;
        return Err(e);
    }
    executor.commit()?;
    info!("rolled back migration '{}'", last.name);
    Ok(DownOutcome::RolledBack { name: last.name })
}

fn apply_failed(name: &str, err: Error) -> Error {
    match err {
        Error::Database(source) => Error::ApplyFailed { name: name.to_string(), source },
        other => other,
    }
}
