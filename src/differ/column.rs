// src/differ/column.rs

//! Field classification and per-column DDL (part of C5 §4.5 "Fields").

use crate::dialect::Dialect;
use crate::model::{Field, FieldKind, Model};

/// `<type> [UNIQUE] [NOT NULL] [DEFAULT ...]`, with PK/autoincrement
/// handled separately by `table::column_definition` for `CREATE TABLE`.
/// Returns an optional preamble statement (Postgres `CREATE TYPE` for an
/// enum column).
pub fn bare_type_clause(dialect: Dialect, table: &str, field: &Field) -> (String, Option<String>) {
    if let FieldKind::Enum { choices } = &field.kind {
        dialect.enum_column_clause(table, &field.name, choices, None)
    } else {
        (dialect.render_type(&field.kind), None)
    }
}

fn column_suffix(dialect: Dialect, field: &Field) -> String {
    let mut parts = Vec::new();
    if field.unique {
        parts.push("UNIQUE".to_string());
    }
    if !field.nullable {
        parts.push("NOT NULL".to_string());
    }
    if let Some(default) = &field.default {
        parts.push(format!("DEFAULT {}", dialect.render_default(default)));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" {}", parts.join(" "))
    }
}

/// `ADD COLUMN <name> <type> [...]` fragment (no PK/autoincrement: those
/// can't be retrofitted onto an existing table via `ADD COLUMN`).
pub fn add_column_fragment(dialect: Dialect, table: &str, field: &Field) -> (String, Option<String>) {
    let (type_clause, preamble) = bare_type_clause(dialect, table, field);
    let ident = dialect.quote_ident(&field.name);
    let suffix = column_suffix(dialect, field);
    (format!("{ident} {type_clause}{suffix}"), preamble)
}

pub struct FieldDiff {
    pub forward: Vec<String>,
    pub reverse: Vec<String>,
    pub warnings: Vec<String>,
    /// Set when SQLite cannot express a required change (type, nullability
    /// or default change on an existing column) and the whole table must
    /// go through the rebuild policy (`differ::rebuild`) instead.
    pub needs_rebuild: bool,
}

impl FieldDiff {
    fn empty() -> Self {
        Self {
            forward: Vec::new(),
            reverse: Vec::new(),
            warnings: Vec::new(),
            needs_rebuild: false,
        }
    }
}

/// Trait object for the rename-confirmation prompt (spec.md §6's "rename
/// oracle"); non-interactive callers always answer `false`.
pub trait RenameOracle {
    fn confirm_rename(&self, table: &str, old: &str, new: &str, type_tag: &str) -> bool;
}

pub struct NonInteractiveOracle;

impl RenameOracle for NonInteractiveOracle {
    fn confirm_rename(&self, _table: &str, _old: &str, _new: &str, _type_tag: &str) -> bool {
        false
    }
}

/// Confirmed renames between `old_model` and `current_model`: `new_name ->
/// old_name`. Shared by [`diff_fields`] (emits `RENAME COLUMN`) and the
/// SQLite rebuild policy (needs to know which old column feeds a new one
/// in the `INSERT INTO ... SELECT` it builds).
pub fn detect_renames(table: &str, old_model: &Model, current_model: &Model, oracle: &dyn RenameOracle) -> std::collections::HashMap<String, String> {
    let mut renames = std::collections::HashMap::new();
    let dropped: Vec<&Field> = old_model
        .fields
        .values()
        .filter(|f| !current_model.fields.contains_key(&f.name))
        .collect();
    let added: Vec<&Field> = current_model
        .fields
        .values()
        .filter(|f| !old_model.fields.contains_key(&f.name))
        .collect();
    let mut taken = vec![false; dropped.len()];
    for new_field in &added {
        for (di, old_field) in dropped.iter().enumerate() {
            if taken[di] {
                continue;
            }
            if old_field.kind == new_field.kind
                && old_field.nullable == new_field.nullable
                && old_field.default == new_field.default
                && oracle.confirm_rename(table, &old_field.name, &new_field.name, old_field.kind.tag())
            {
                renames.insert(new_field.name.clone(), old_field.name.clone());
                taken[di] = true;
                break;
            }
        }
    }
    renames
}

/// Diff `old_model`'s fields against `current_model`'s fields for one
/// existing table, following the drop/add/modify/rename classification of
/// spec.md §4.5.
pub fn diff_fields(
    dialect: Dialect,
    table: &str,
    old_model: &Model,
    current_model: &Model,
    oracle: &dyn RenameOracle,
) -> FieldDiff {
    let mut diff = FieldDiff::empty();

    let mut dropped: Vec<&Field> = old_model
        .fields
        .values()
        .filter(|f| !current_model.fields.contains_key(&f.name))
        .collect();
    let mut added: Vec<&Field> = current_model
        .fields
        .values()
        .filter(|f| !old_model.fields.contains_key(&f.name))
        .collect();
    let modified: Vec<(&Field, &Field)> = current_model
        .fields
        .iter()
        .filter_map(|(name, new_field)| old_model.fields.get(name).map(|old_field| (old_field, new_field)))
        .filter(|(old_field, new_field)| fields_materially_differ(old_field, new_field))
        .collect();

    // Rename detection: an added/dropped pair with identical type,
    // nullability, and default is offered to the oracle before being
    // treated as a drop-then-add.
    let mut renamed_added = vec![false; added.len()];
    let mut renamed_dropped = vec![false; dropped.len()];
    for (di, old_field) in dropped.iter().enumerate() {
        for (ai, new_field) in added.iter().enumerate() {
            if renamed_added[ai] {
                continue;
            }
            if old_field.kind == new_field.kind
                && old_field.nullable == new_field.nullable
                && old_field.default == new_field.default
                && oracle.confirm_rename(table, &old_field.name, &new_field.name, old_field.kind.tag())
            {
                let ident_old = dialect.quote_ident(&old_field.name);
                let ident_new = dialect.quote_ident(&new_field.name);
                let table_ident = dialect.quote_ident(table);
                diff.forward
                    .push(format!("ALTER TABLE {table_ident} RENAME COLUMN {ident_old} TO {ident_new};"));
                diff.reverse
                    .push(format!("ALTER TABLE {table_ident} RENAME COLUMN {ident_new} TO {ident_old};"));
                renamed_added[ai] = true;
                renamed_dropped[di] = true;
                break;
            }
        }
    }

    let mut idx = 0;
    dropped.retain(|_| {
        let keep = !renamed_dropped[idx];
        idx += 1;
        keep
    });
    let mut idx = 0;
    added.retain(|_| {
        let keep = !renamed_added[idx];
        idx += 1;
        keep
    });

    let table_ident = dialect.quote_ident(table);

    for field in &dropped {
        let ident = dialect.quote_ident(&field.name);
        diff.forward.push(format!("ALTER TABLE {table_ident} DROP COLUMN {ident};"));
        let (add_fragment, preamble) = add_column_fragment(dialect, table, field);
        if let Some(p) = preamble {
            diff.reverse.push(p);
        }
        diff.reverse.push(format!("ALTER TABLE {table_ident} ADD COLUMN {add_fragment};"));
    }

    for field in &added {
        let (add_fragment, preamble) = add_column_fragment(dialect, table, field);
        if !field.nullable && field.default.is_none() {
            diff.warnings.push(format!(
                "column '{}' on table '{table}' is NOT NULL with no default; existing rows will need a value",
                field.name
            ));
        }
        if let Some(p) = preamble {
            diff.forward.push(p);
        }
        diff.forward.push(format!("ALTER TABLE {table_ident} ADD COLUMN {add_fragment};"));
        let ident = dialect.quote_ident(&field.name);
        diff.reverse.push(format!("ALTER TABLE {table_ident} DROP COLUMN {ident};"));
    }

    if !modified.is_empty() {
        if dialect == Dialect::Sqlite {
            diff.needs_rebuild = true;
        } else {
            for (old_field, new_field) in &modified {
                emit_modify(dialect, &table_ident, old_field, new_field, &mut diff);
            }
        }
    }

    diff
}

fn fields_materially_differ(old_field: &Field, new_field: &Field) -> bool {
    old_field.kind != new_field.kind || old_field.nullable != new_field.nullable || old_field.default != new_field.default
}

fn emit_modify(dialect: Dialect, table_ident: &str, old_field: &Field, new_field: &Field, diff: &mut FieldDiff) {
    let ident = dialect.quote_ident(&new_field.name);

    if old_field.kind != new_field.kind {
        let (new_type, _) = bare_type_clause(dialect, table_ident, new_field);
        let (old_type, _) = bare_type_clause(dialect, table_ident, old_field);
        diff.forward
            .push(format!("ALTER TABLE {table_ident} ALTER COLUMN {ident} TYPE {new_type};"));
        diff.reverse
            .push(format!("ALTER TABLE {table_ident} ALTER COLUMN {ident} TYPE {old_type};"));
    }

    if old_field.nullable != new_field.nullable {
        let forward_action = if new_field.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        let reverse_action = if old_field.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        diff.forward
            .push(format!("ALTER TABLE {table_ident} ALTER COLUMN {ident} {forward_action};"));
        diff.reverse
            .push(format!("ALTER TABLE {table_ident} ALTER COLUMN {ident} {reverse_action};"));
    }

    if old_field.default != new_field.default {
        match &new_field.default {
            Some(default) => diff.forward.push(format!(
                "ALTER TABLE {table_ident} ALTER COLUMN {ident} SET DEFAULT {};",
                dialect.render_default(default)
            )),
            None => diff
                .forward
                .push(format!("ALTER TABLE {table_ident} ALTER COLUMN {ident} DROP DEFAULT;")),
        }
        match &old_field.default {
            Some(default) => diff.reverse.push(format!(
                "ALTER TABLE {table_ident} ALTER COLUMN {ident} SET DEFAULT {};",
                dialect.render_default(default)
            )),
            None => diff
                .reverse
                .push(format!("ALTER TABLE {table_ident} ALTER COLUMN {ident} DROP DEFAULT;")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldOptions, ModelMeta, TriggerSlot};
    use std::collections::HashMap;

    fn int_field(name: &str) -> Field {
        Field::new(name, FieldKind::Integer, FieldOptions::default()).unwrap()
    }

    fn model(name: &str, fields: Vec<Field>) -> Model {
        Model::new(
            name,
            fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
            vec![],
            HashMap::<TriggerSlot, crate::model::Trigger>::new(),
            ModelMeta::default(),
        )
        .unwrap()
    }

    #[test]
    fn detects_added_column_and_warns_on_not_null_without_default() {
        let old = model("users", vec![int_field("id")]);
        let current = model(
            "users",
            vec![
                int_field("id"),
                Field::new(
                    "age",
                    FieldKind::Integer,
                    FieldOptions {
                        nullable: false,
                        ..Default::default()
                    },
                )
                .unwrap(),
            ],
        );
        let diff = diff_fields(Dialect::Postgres, "users", &old, &current, &NonInteractiveOracle);
        assert!(diff.forward.iter().any(|s| s.contains("ADD COLUMN")));
        assert_eq!(diff.warnings.len(), 1);
    }

    #[test]
    fn detects_dropped_column() {
        let old = model("users", vec![int_field("id"), int_field("legacy")]);
        let current = model("users", vec![int_field("id")]);
        let diff = diff_fields(Dialect::Postgres, "users", &old, &current, &NonInteractiveOracle);
        assert!(diff.forward.iter().any(|s| s.contains("DROP COLUMN")));
        assert!(diff.reverse.iter().any(|s| s.contains("ADD COLUMN")));
    }

    #[test]
    fn sqlite_modify_requires_rebuild() {
        let old = model("users", vec![int_field("id")]);
        let current = model(
            "users",
            vec![Field::new(
                "id",
                FieldKind::Integer,
                FieldOptions {
                    nullable: true,
                    ..Default::default()
                },
            )
            .unwrap()],
        );
        let diff = diff_fields(Dialect::Sqlite, "users", &old, &current, &NonInteractiveOracle);
        assert!(diff.needs_rebuild);
        assert!(diff.forward.is_empty());
    }

    #[test]
    fn postgres_modify_emits_alter_column() {
        let old = model("users", vec![int_field("id")]);
        let current = model(
            "users",
            vec![Field::new(
                "id",
                FieldKind::Integer,
                FieldOptions {
                    nullable: true,
                    ..Default::default()
                },
            )
            .unwrap()],
        );
        let diff = diff_fields(Dialect::Postgres, "users", &old, &current, &NonInteractiveOracle);
        assert!(!diff.needs_rebuild);
        assert!(diff.forward.iter().any(|s| s.contains("DROP NOT NULL")));
    }
}
