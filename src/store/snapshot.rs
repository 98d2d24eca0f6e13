// src/store/snapshot.rs

//! `schema_snapshot.json` read/write (part of C6, spec.md §4.6/§6):
//! pretty-printed, two-space-indented JSON holding the topologically
//! ordered `Schema::canonical_view()`. Written atomically only after
//! `create` succeeds, never on `up`.

use crate::error::Result;
use crate::model::Schema;
use std::fs;
use std::io::Write;
use std::path::Path;

/// `None` when no snapshot has ever been written (first `create`), matching
/// spec.md §4.7's "Read old snapshot (empty if absent)".
pub fn read(path: &Path) -> Result<Option<Schema>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let value = serde_json::from_str(&text)?;
    Ok(Some(Schema::from_canonical_view(&value)?))
}

/// Write the snapshot atomically: serialize to a sibling temp file, then
/// rename over the final path, so a crash mid-write never leaves a
/// truncated `schema_snapshot.json` behind.
pub fn write(path: &Path, schema: &Schema) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let pretty = serde_json::to_string_pretty(&schema.canonical_view())?;
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(pretty.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldKind, FieldOptions, Model, ModelMeta, TriggerSlot};
    use crate::ordered::OrderedMap;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn sample_schema() -> Schema {
        let id = Field::new(
            "id",
            FieldKind::Integer,
            FieldOptions {
                primary_key: true,
                auto_increment: true,
                ..Default::default()
            },
        )
        .unwrap();
        let model = Model::new(
            "users",
            vec![("id".into(), id)],
            vec![],
            HashMap::<TriggerSlot, crate::model::Trigger>::new(),
            ModelMeta::default(),
        )
        .unwrap();
        let mut models = OrderedMap::new();
        models.insert("users", model);
        Schema::new(models)
    }

    #[test]
    fn missing_snapshot_reads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema_snapshot.json");
        assert!(read(&path).unwrap().is_none());
    }

    #[test]
    fn write_then_read_preserves_checksum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema_snapshot.json");
        let schema = sample_schema();
        write(&path, &schema).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with('{'));
        assert!(text.contains("  \""), "expected two-space indentation");

        let loaded = read(&path).unwrap().unwrap();
        assert_eq!(schema.checksum().unwrap(), loaded.checksum().unwrap());
    }
}
