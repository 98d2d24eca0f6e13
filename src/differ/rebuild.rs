// src/differ/rebuild.rs

//! SQLite table-rebuild policy (part of C3's dialect-specific behavior,
//! invoked from the differ whenever SQLite can't express a mutation
//! directly — spec.md §4.3).

use super::column::{detect_renames, RenameOracle};
use super::table;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::exec::Introspector;
use crate::model::{Index, Model, Trigger, TriggerSlot};

pub struct RebuildOutcome {
    pub forward: Vec<String>,
    pub reverse: Vec<String>,
    pub warnings: Vec<String>,
}

/// Rebuild `old_model`'s table into `current_model`'s shape. Both models
/// must share the same effective table name (the differ only calls this
/// for an existing table being mutated, not a rename — renames are plain
/// `ALTER TABLE RENAME TO` and don't need a rebuild).
pub fn rebuild_table(
    old_model: &Model,
    current_model: &Model,
    oracle: &dyn RenameOracle,
    introspector: &dyn Introspector,
    current_inline_fks: &[table::InlineForeignKey],
    old_inline_fks: &[table::InlineForeignKey],
) -> Result<RebuildOutcome> {
    let table_name = old_model.effective_table_name();
    let dialect = Dialect::Sqlite;

    let referencing = introspector.referencing_tables(table_name);
    if !referencing.is_empty() {
        return Err(Error::RebuildBlocked {
            table: table_name.to_string(),
            reason: format!("referenced by: {}", referencing.join(", ")),
        });
    }

    let needle = table_name.to_string();
    let mentioning_trigger = introspector
        .trigger_bodies()
        .into_iter()
        .find(|(_, body)| body.contains(&needle));
    if let Some((trigger_name, _)) = mentioning_trigger {
        return Err(Error::RebuildBlocked {
            table: table_name.to_string(),
            reason: format!("referenced by trigger '{trigger_name}'"),
        });
    }

    let renames = detect_renames(table_name, old_model, current_model, oracle);

    let mut warnings = Vec::new();
    let new_table_name = format!("{table_name}_new");
    let mut staged_current = current_model.clone();
    staged_current.meta.table_name = Some(new_table_name.clone());
    let (mut create_new, _) = table::create_table(dialect, &staged_current, current_inline_fks)?;

    let mut select_exprs = Vec::new();
    for field in current_model.fields.values() {
        if old_model.fields.contains_key(&field.name) {
            select_exprs.push(dialect.quote_ident(&field.name));
        } else if let Some(old_name) = renames.get(&field.name) {
            select_exprs.push(dialect.quote_ident(old_name));
        } else if let Some(default) = &field.default {
            select_exprs.push(dialect.render_default(default));
        } else {
            if !field.nullable {
                warnings.push(format!(
                    "column '{}' on table '{table_name}' has no source column and no default; rebuilt rows get NULL despite NOT NULL",
                    field.name
                ));
            }
            select_exprs.push("NULL".to_string());
        }
    }

    let old_ident = dialect.quote_ident(table_name);
    let new_ident = dialect.quote_ident(&new_table_name);
    let insert = format!(
        "INSERT INTO {new_ident} SELECT {} FROM {old_ident};",
        select_exprs.join(", ")
    );

    let indexes_ddl = captured_indexes_ddl(dialect, table_name, &current_model.meta.indexes);
    let triggers_ddl = captured_triggers_ddl(dialect, table_name, current_model);

    let mut forward = vec!["PRAGMA foreign_keys=OFF;".to_string()];
    forward.append(&mut create_new);
    forward.push(insert);
    forward.push(format!("DROP TABLE {old_ident};"));
    forward.push(format!("ALTER TABLE {new_ident} RENAME TO {old_ident};"));
    forward.extend(indexes_ddl);
    forward.extend(triggers_ddl);
    forward.push("PRAGMA foreign_keys=ON;".to_string());

    // Reverse is symmetric against a provisional `<table>_old`, rebuilding
    // the old shape from the (now current) live table.
    let old_table_name = format!("{table_name}_old");
    let mut staged_old = old_model.clone();
    staged_old.meta.table_name = Some(old_table_name.clone());
    let (mut create_old, _) = table::create_table(dialect, &staged_old, old_inline_fks)?;

    let mut reverse_exprs = Vec::new();
    for field in old_model.fields.values() {
        if current_model.fields.contains_key(&field.name) {
            reverse_exprs.push(dialect.quote_ident(&field.name));
        } else if let Some((new_name, _)) = renames.iter().find(|(_, old_name)| *old_name == &field.name) {
            reverse_exprs.push(dialect.quote_ident(new_name));
        } else if let Some(default) = &field.default {
            reverse_exprs.push(dialect.render_default(default));
        } else {
            reverse_exprs.push("NULL".to_string());
        }
    }
    let old_provisional_ident = dialect.quote_ident(&old_table_name);
    let reverse_insert = format!(
        "INSERT INTO {old_provisional_ident} SELECT {} FROM {old_ident};",
        reverse_exprs.join(", ")
    );

    let reverse_indexes_ddl = captured_indexes_ddl(dialect, table_name, &old_model.meta.indexes);
    let reverse_triggers_ddl = captured_triggers_ddl(dialect, table_name, old_model);

    let mut reverse = vec!["PRAGMA foreign_keys=OFF;".to_string()];
    reverse.append(&mut create_old);
    reverse.push(reverse_insert);
    reverse.push(format!("DROP TABLE {old_ident};"));
    reverse.push(format!("ALTER TABLE {old_provisional_ident} RENAME TO {old_ident};"));
    reverse.extend(reverse_indexes_ddl);
    reverse.extend(reverse_triggers_ddl);
    reverse.push("PRAGMA foreign_keys=ON;".to_string());

    Ok(RebuildOutcome { forward, reverse, warnings })
}

fn captured_indexes_ddl(dialect: Dialect, table: &str, indexes: &[Index]) -> Vec<String> {
    indexes
        .iter()
        .map(|index| super::index::diff_indexes(dialect, table, &[], std::slice::from_ref(index)).forward)
        .flatten()
        .collect()
}

fn captured_triggers_ddl(dialect: Dialect, table: &str, model: &Model) -> Vec<String> {
    let mut ddl = Vec::new();
    for slot in TriggerSlot::ALL {
        if let Some(trigger) = model.triggers.get(&slot) {
            ddl.extend(recreate_trigger(dialect, table, slot, trigger));
        }
    }
    ddl
}

fn recreate_trigger(dialect: Dialect, table: &str, slot: TriggerSlot, trigger: &Trigger) -> Vec<String> {
    super::trigger::create_instances(dialect, table, slot, trigger)
}
