// src/differ/mod.rs

//! Differ (C5): `diff(old, current) -> {forward, reverse, warnings}` across
//! tables, columns, relations, triggers and indexes, per spec.md §4.5. This
//! is the largest component — orchestration lives here, dimension-specific
//! logic in the sibling modules.

pub mod column;
pub mod index;
pub mod rebuild;
pub mod relation;
pub mod table;
pub mod trigger;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::exec::Introspector;
use crate::model::{Model, Schema, TriggerSlot};
use crate::validator;
use column::RenameOracle;

pub struct Diff {
    pub forward: Vec<String>,
    pub reverse: Vec<String>,
    pub warnings: Vec<String>,
}

/// Run the full differ. `current` is assumed already topologically ordered
/// (the output of `resolver::resolve`) — the differ never reorders it.
pub fn diff(
    dialect: Dialect,
    old: &Schema,
    current: &Schema,
    introspector: &dyn Introspector,
    oracle: &dyn RenameOracle,
) -> Result<Diff> {
    let mut forward = Vec::new();
    let mut reverse = Vec::new();
    let mut warnings = Vec::new();
    let mut deferred_global: Vec<(String, relation::RelationStatements)> = Vec::new();
    let mut deferred_triggers: Vec<(Vec<String>, Vec<String>)> = Vec::new();

    for (_, current_model) in current.iter() {
        let table_name = current_model.effective_table_name();
        let found_old = old.find_by_effective_table(table_name);

        match found_old {
            None => {
                diff_new_table(
                    dialect,
                    current,
                    current_model,
                    introspector,
                    &mut forward,
                    &mut reverse,
                    &mut warnings,
                    &mut deferred_triggers,
                )?;
            }
            Some((_, old_model)) => {
                diff_existing_table(
                    dialect,
                    old,
                    current,
                    old_model,
                    current_model,
                    introspector,
                    oracle,
                    &mut forward,
                    &mut reverse,
                    &mut warnings,
                    &mut deferred_global,
                    &mut deferred_triggers,
                )?;
            }
        }
    }

    // Dropped tables: any old effective table absent from current.
    for (_, old_model) in old.iter() {
        let table_name = old_model.effective_table_name();
        if current.find_by_effective_table(table_name).is_none() {
            let ident = dialect.quote_ident(table_name);
            forward.push(format!("DROP TABLE IF EXISTS {ident};"));
            let (recreate, _) = table::create_table(dialect, old_model, &[])?;
            reverse.extend(recreate);
            warnings.push(format!("table '{table_name}' was dropped"));
        }
    }

    // Globally deferred relations (owner table already existed before this
    // batch; target has only now become resolvable).
    for (_, stmts) in deferred_global {
        forward.extend(stmts.forward);
        reverse.extend(stmts.reverse);
    }

    // Globally deferred triggers: a statement named an in-batch table that
    // wasn't resolvable yet when its slot was diffed (spec.md §4.8: "the
    // whole trigger is deferred with the relation pass").
    for (trig_forward, trig_reverse) in deferred_triggers {
        forward.extend(trig_forward);
        reverse.extend(trig_reverse);
    }

    Ok(Diff { forward, reverse, warnings })
}

#[allow(clippy::too_many_arguments)]
fn diff_new_table(
    dialect: Dialect,
    current_schema: &Schema,
    current_model: &Model,
    introspector: &dyn Introspector,
    forward: &mut Vec<String>,
    reverse: &mut Vec<String>,
    warnings: &mut Vec<String>,
    deferred_triggers: &mut Vec<(Vec<String>, Vec<String>)>,
) -> Result<()> {
    let table_name = current_model.effective_table_name().to_string();
    let mut inline_fks = Vec::new();

    for (_, rel) in current_model.relations.iter() {
        let target = relation::target_in_batch(current_schema, &rel.target);
        let in_batch = target.is_some();
        let target_defines_key = target.map(|m| !m.primary_key_fields().is_empty()).unwrap_or(false);
        let target_key = target
            .map(relation::target_key_column)
            .unwrap_or_else(|| "id".to_string());

        let decision = relation::decide(&rel.target, &target_key, in_batch, target_defines_key, introspector);
        match decision {
            relation::Decision::Error => {
                return Err(Error::InvalidSchema(format!(
                    "model '{}': relation to '{}' cannot be resolved (not in database and not defined in the current batch)",
                    current_model.name, rel.target
                )));
            }
            relation::Decision::CreateNow | relation::Decision::Defer => {
                // A brand-new owner table always inlines its FK clauses:
                // SQLite cannot express ADD CONSTRAINT at all, and inlining
                // is equally valid SQL for Postgres/MySQL, so there is no
                // separate ALTER pass for a table created this batch.
                inline_fks.extend(
                    relation::inline_clauses(rel, &table_name, &target_key)
                        .into_iter()
                        .map(|i| table::InlineForeignKey {
                            column: i.column,
                            referenced_table: i.referenced_table,
                            referenced_column: i.referenced_column,
                        }),
                );
                if rel.kind == crate::model::RelationKind::ManyToMany {
                    let stmts = relation::create_now_statements(dialect, &table_name, rel, &target_key);
                    forward.extend(stmts.forward);
                    reverse.extend(stmts.reverse);
                }
            }
        }
    }

    let (create_forward, create_reverse) = table::create_table(dialect, current_model, &inline_fks)?;
    forward.extend(create_forward);
    reverse.extend(create_reverse);

    diff_triggers(
        dialect,
        &table_name,
        current_schema,
        introspector,
        None,
        current_model,
        forward,
        reverse,
        warnings,
        deferred_triggers,
    )?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn diff_existing_table(
    dialect: Dialect,
    old_schema: &Schema,
    current_schema: &Schema,
    old_model: &Model,
    current_model: &Model,
    introspector: &dyn Introspector,
    oracle: &dyn RenameOracle,
    forward: &mut Vec<String>,
    reverse: &mut Vec<String>,
    warnings: &mut Vec<String>,
    deferred_global: &mut Vec<(String, relation::RelationStatements)>,
    deferred_triggers: &mut Vec<(Vec<String>, Vec<String>)>,
) -> Result<()> {
    let old_table = old_model.effective_table_name().to_string();
    let new_table = current_model.effective_table_name().to_string();

    // Meta: table rename.
    if old_table != new_table {
        forward.push(format!(
            "ALTER TABLE {} RENAME TO {};",
            dialect.quote_ident(&old_table),
            dialect.quote_ident(&new_table)
        ));
        reverse.push(format!(
            "ALTER TABLE {} RENAME TO {};",
            dialect.quote_ident(&new_table),
            dialect.quote_ident(&old_table)
        ));
    }
    let table = new_table.clone();

    // Index diff (also part of "Meta").
    let index_diff = index::diff_indexes(dialect, &table, &old_model.meta.indexes, &current_model.meta.indexes);
    forward.extend(index_diff.forward);
    reverse.extend(index_diff.reverse);

    // Fields.
    let field_diff = column::diff_fields(dialect, &table, old_model, current_model, oracle);

    // Relations: decide createNow/defer/error for every current relation not
    // already present identically on the old side.
    let mut relation_changed = false;
    let mut new_createnow = Vec::new();
    let mut new_defer = Vec::new();

    for (key, rel) in current_model.relations.iter() {
        let unchanged = old_model.relations.get(key).map(|old_rel| old_rel == rel).unwrap_or(false);
        if unchanged {
            continue;
        }
        relation_changed = true;

        let target = relation::target_in_batch(current_schema, &rel.target);
        let in_batch = target.is_some();
        let target_defines_key = target.map(|m| !m.primary_key_fields().is_empty()).unwrap_or(false);
        let target_key = target
            .map(relation::target_key_column)
            .unwrap_or_else(|| "id".to_string());
        let decision = relation::decide(&rel.target, &target_key, in_batch, target_defines_key, introspector);

        match decision {
            relation::Decision::Error => {
                return Err(Error::InvalidSchema(format!(
                    "model '{}': relation to '{}' cannot be resolved (not in database and not defined in the current batch)",
                    current_model.name, rel.target
                )));
            }
            relation::Decision::CreateNow => new_createnow.push((rel.clone(), target_key)),
            // Target is in this batch but not yet resolvable — hold the
            // ADD CONSTRAINT/index pair until every current-batch table has
            // been created, then emit it in the global deferred pass.
            relation::Decision::Defer => new_defer.push((rel.clone(), target_key)),
        }
    }

    // Removed relations reverse the creation DDL.
    let mut removed_relations = Vec::new();
    for (key, old_rel) in old_model.relations.iter() {
        if !current_model.relations.contains_key(key) {
            let target = relation::target_in_batch(old_schema, &old_rel.target);
            let target_key = target
                .map(relation::target_key_column)
                .unwrap_or_else(|| "id".to_string());
            removed_relations.push((old_rel.clone(), target_key));
            relation_changed = true;
        }
    }

    if dialect == Dialect::Sqlite && (field_diff.needs_rebuild || relation_changed) {
        let current_inline = current_model
            .relations
            .values()
            .filter_map(|rel| {
                let target = relation::target_in_batch(current_schema, &rel.target);
                let target_key = target
                    .map(relation::target_key_column)
                    .unwrap_or_else(|| "id".to_string());
                relation::inline_clauses(rel, &table, &target_key).into_iter().next().map(|i| table::InlineForeignKey {
                    column: i.column,
                    referenced_table: i.referenced_table,
                    referenced_column: i.referenced_column,
                })
            })
            .collect::<Vec<_>>();
        let old_inline = old_model
            .relations
            .values()
            .filter_map(|rel| {
                let target = relation::target_in_batch(old_schema, &rel.target);
                let target_key = target
                    .map(relation::target_key_column)
                    .unwrap_or_else(|| "id".to_string());
                relation::inline_clauses(rel, &old_table, &target_key).into_iter().next().map(|i| table::InlineForeignKey {
                    column: i.column,
                    referenced_table: i.referenced_table,
                    referenced_column: i.referenced_column,
                })
            })
            .collect::<Vec<_>>();

        let outcome = rebuild::rebuild_table(old_model, current_model, oracle, introspector, &current_inline, &old_inline)?;
        forward.extend(outcome.forward);
        reverse.extend(outcome.reverse);
        warnings.extend(outcome.warnings);
    } else {
        forward.extend(field_diff.forward);
        reverse.extend(field_diff.reverse);
        warnings.extend(field_diff.warnings);

        for (rel, target_key) in &new_createnow {
            let stmts = relation::create_now_statements(dialect, &table, rel, target_key);
            forward.extend(stmts.forward.clone());
            reverse.extend(stmts.reverse.clone());
        }
        for (rel, target_key) in &removed_relations {
            let stmts = relation::create_now_statements(dialect, &table, rel, target_key);
            // Removing a relation reverses creation: forward is the
            // creation's reverse, reverse is the creation's forward.
            forward.extend(stmts.reverse);
            reverse.extend(stmts.forward);
        }
        for (rel, target_key) in new_defer {
            let stmts = relation::create_now_statements(dialect, &table, &rel, &target_key);
            deferred_global.push((table.clone(), stmts));
        }
    }

    // Triggers.
    diff_triggers(
        dialect,
        &table,
        current_schema,
        introspector,
        Some(old_model),
        current_model,
        forward,
        reverse,
        warnings,
        deferred_triggers,
    )?;

    Ok(())
}

/// Emit the trigger diff for every slot. Any statement about to be (re-)created
/// is run through the C8 validator first (spec.md §4.5: "re-emit every
/// statement (validated by C8 first)") — an `InvalidTrigger` here aborts the
/// whole `create` before any DDL is written. A statement the validator flags
/// `deferred` names a table that's in this batch but not yet created, so its
/// whole slot is routed to `deferred_triggers` instead of `forward`/`reverse`
/// directly (spec.md §4.8: "the whole trigger is deferred with the relation
/// pass") — otherwise the `CREATE TRIGGER` could be emitted ahead of the
/// `CREATE TABLE` it references.
#[allow(clippy::too_many_arguments)]
fn diff_triggers(
    dialect: Dialect,
    table: &str,
    schema: &Schema,
    introspector: &dyn Introspector,
    old_model: Option<&Model>,
    current_model: &Model,
    forward: &mut Vec<String>,
    reverse: &mut Vec<String>,
    warnings: &mut Vec<String>,
    deferred_triggers: &mut Vec<(Vec<String>, Vec<String>)>,
) -> Result<()> {
    for slot in TriggerSlot::ALL {
        let old_trigger = old_model.and_then(|m| m.triggers.get(&slot));
        let current_trigger = current_model.triggers.get(&slot);

        let mut slot_deferred = false;
        if let Some(trigger) = current_trigger {
            let unchanged = old_trigger.map(|o| trigger::statements_identical(o, trigger)).unwrap_or(false);
            if !unchanged {
                for stmt in &trigger.statements {
                    let (deferred, stmt_warnings) = validator::validate_statement(&stmt.body, schema, introspector)?;
                    slot_deferred = slot_deferred || deferred;
                    warnings.extend(stmt_warnings);
                }
            }
        }

        let slot_diff = trigger::diff_slot(dialect, table, slot, old_trigger, current_trigger);
        if slot_deferred {
            deferred_triggers.push((slot_diff.forward, slot_diff.reverse));
        } else {
            forward.extend(slot_diff.forward);
            reverse.extend(slot_diff.reverse);
        }
    }
    Ok(())
}
