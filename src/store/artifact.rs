// src/store/artifact.rs

//! Migration artifact naming and I/O (part of C6, spec.md §3/§4.6/§6): the
//! `<epoch-ms>_<slug>` file stem, and the forward/reverse `.sql` pair a
//! `create` run writes to the migrations directory.
//!
//! spec.md describes the reverse payload as "a `.js`-equivalent" in the
//! source language it was distilled from; there is no SQL analog to that
//! format, so the reverse payload here is plain SQL under a `.down.sql`
//! suffix next to the forward file's `.sql` (documented as Open Question
//! decision #5 in DESIGN.md).

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE_NAME: &str = "schema_snapshot.json";
const FORWARD_SUFFIX: &str = ".sql";
const REVERSE_SUFFIX: &str = ".down.sql";
const CHECKSUM_SUFFIX: &str = ".checksum";

/// Lowercase a migration name, replace any character outside `[a-z0-9_-]`
/// with `_`, then trim leading/trailing underscores (spec.md §3).
pub fn slugify(name: &str) -> String {
    let lowered = name.to_ascii_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    replaced.trim_matches('_').to_string()
}

/// `<epoch-ms>_<slug>` file stem for a new migration.
pub fn stem(epoch_ms: i64, name: &str) -> String {
    format!("{epoch_ms}_{}", slugify(name))
}

pub fn forward_path(migrations_dir: &Path, stem: &str) -> PathBuf {
    migrations_dir.join(format!("{stem}{FORWARD_SUFFIX}"))
}

pub fn reverse_path(migrations_dir: &Path, stem: &str) -> PathBuf {
    migrations_dir.join(format!("{stem}{REVERSE_SUFFIX}"))
}

pub fn checksum_path(migrations_dir: &Path, stem: &str) -> PathBuf {
    migrations_dir.join(format!("{stem}{CHECKSUM_SUFFIX}"))
}

pub fn snapshot_path(migrations_dir: &Path) -> PathBuf {
    migrations_dir.join(SNAPSHOT_FILE_NAME)
}

/// Write every half of an artifact: forward DDL, reverse DDL, and the
/// checksum of the schema this migration targets (spec.md §3: the history
/// row's checksum is "of the snapshot captured when the migration was
/// written" — a per-migration value, so it travels with the artifact rather
/// than being re-derived later from whatever `schema_snapshot.json` happens
/// to hold at apply time). Forward is written first so a crash between
/// writes still leaves `up` able to apply the migration — only `down` and
/// drift-checking would be unavailable until the remaining files are
/// retried.
pub fn write(migrations_dir: &Path, stem: &str, forward_sql: &str, reverse_sql: &str, target_checksum: &str) -> Result<()> {
    fs::create_dir_all(migrations_dir)?;
    fs::write(forward_path(migrations_dir, stem), forward_sql)?;
    fs::write(reverse_path(migrations_dir, stem), reverse_sql)?;
    fs::write(checksum_path(migrations_dir, stem), target_checksum)?;
    Ok(())
}

pub fn read_forward(migrations_dir: &Path, stem: &str) -> Result<String> {
    Ok(fs::read_to_string(forward_path(migrations_dir, stem))?)
}

pub fn read_reverse(migrations_dir: &Path, stem: &str) -> Result<String> {
    Ok(fs::read_to_string(reverse_path(migrations_dir, stem))?)
}

pub fn read_checksum(migrations_dir: &Path, stem: &str) -> Result<String> {
    Ok(fs::read_to_string(checksum_path(migrations_dir, stem))?.trim().to_string())
}

/// Every on-disk artifact stem, in lexicographic order — which coincides
/// with chronological order thanks to the epoch-ms prefix (spec.md §4.6).
/// The snapshot file and reverse/checksum halves are excluded; only forward
/// `.sql` files name a migration.
pub fn list_stems(migrations_dir: &Path) -> Result<Vec<String>> {
    if !migrations_dir.exists() {
        return Ok(Vec::new());
    }
    let mut stems = Vec::new();
    for entry in fs::read_dir(migrations_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else { continue };
        if name == SNAPSHOT_FILE_NAME || name.ends_with(REVERSE_SUFFIX) || name.ends_with(CHECKSUM_SUFFIX) {
            continue;
        }
        if let Some(stripped) = name.strip_suffix(FORWARD_SUFFIX) {
            stems.push(stripped.to_string());
        }
    }
    stems.sort();
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn slugify_replaces_disallowed_characters_and_trims() {
        assert_eq!(slugify("  Add Users Table! "), "add_users_table");
        assert_eq!(slugify("__leading_and_trailing__"), "leading_and_trailing");
    }

    #[test]
    fn stem_combines_epoch_and_slug() {
        assert_eq!(stem(1700000000000, "Add Users"), "1700000000000_add_users");
    }

    #[test]
    fn list_stems_excludes_snapshot_and_reverse_files_and_sorts() {
        let dir = tempdir().unwrap();
        write(dir.path(), "2_b", "fwd", "rev", "sum2").unwrap();
        write(dir.path(), "1_a", "fwd", "rev", "sum1").unwrap();
        fs::write(snapshot_path(dir.path()), "{}").unwrap();
        let stems = list_stems(dir.path()).unwrap();
        assert_eq!(stems, vec!["1_a".to_string(), "2_b".to_string()]);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        write(dir.path(), "1_init", "CREATE TABLE x;", "DROP TABLE x;", "deadbeef").unwrap();
        assert_eq!(read_forward(dir.path(), "1_init").unwrap(), "CREATE TABLE x;");
        assert_eq!(read_reverse(dir.path(), "1_init").unwrap(), "DROP TABLE x;");
        assert_eq!(read_checksum(dir.path(), "1_init").unwrap(), "deadbeef");
    }
}
