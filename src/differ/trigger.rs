// src/differ/trigger.rs

//! Trigger diffing, one slot at a time (part of C5 §4.5 "Triggers").
//!
//! A trigger slot is compared wholesale: if its statement list changed at
//! all, every instance in the slot is dropped and every instance re-created
//! (matching spec.md §4.5 / S7 — a partial edit still reissues the whole
//! slot, it doesn't try to patch individual statement indices).

use crate::dialect::Dialect;
use crate::model::trigger::{normalize_statement, normalize_when};
use crate::model::{Trigger, TriggerSlot};

pub fn statements_identical(old: &Trigger, current: &Trigger) -> bool {
    if old.statements.len() != current.statements.len() {
        return false;
    }
    old.statements.iter().zip(current.statements.iter()).all(|(o, c)| {
        normalize_statement(&o.body) == normalize_statement(&c.body)
            && o.when.as_deref().map(normalize_when) == c.when.as_deref().map(normalize_when)
    })
}

pub fn drop_instances(dialect: Dialect, table: &str, slot: TriggerSlot, trigger: &Trigger) -> Vec<String> {
    (0..trigger.statements.len())
        .flat_map(|i| {
            let name = Trigger::instance_name(table, slot, i);
            dialect.render_drop_trigger(&name, table)
        })
        .collect()
}

/// Emit `CREATE TRIGGER` for every statement in `trigger`. Bodies/`when`
/// predicates are normalized the same way the snapshot view is (Open
/// Question decision #3), so the live database and the checksum can never
/// silently diverge.
pub fn create_instances(dialect: Dialect, table: &str, slot: TriggerSlot, trigger: &Trigger) -> Vec<String> {
    trigger
        .statements
        .iter()
        .enumerate()
        .flat_map(|(i, stmt)| {
            let name = Trigger::instance_name(table, slot, i);
            let body = normalize_statement(&stmt.body);
            let when = stmt.when.as_deref().map(normalize_when);
            dialect.render_trigger(&name, slot.timing(), slot.event(), table, &body, when.as_deref())
        })
        .collect()
}

pub struct TriggerSlotDiff {
    pub forward: Vec<String>,
    pub reverse: Vec<String>,
}

/// Diff one slot. `old`/`current` are `None` when the model declares no
/// trigger for that slot.
pub fn diff_slot(dialect: Dialect, table: &str, slot: TriggerSlot, old: Option<&Trigger>, current: Option<&Trigger>) -> TriggerSlotDiff {
    match (old, current) {
        (None, None) => TriggerSlotDiff {
            forward: Vec::new(),
            reverse: Vec::new(),
        },
        (Some(old_trigger), None) => TriggerSlotDiff {
            forward: drop_instances(dialect, table, slot, old_trigger),
            reverse: create_instances(dialect, table, slot, old_trigger),
        },
        (None, Some(current_trigger)) => TriggerSlotDiff {
            forward: create_instances(dialect, table, slot, current_trigger),
            reverse: drop_instances(dialect, table, slot, current_trigger),
        },
        (Some(old_trigger), Some(current_trigger)) => {
            if statements_identical(old_trigger, current_trigger) {
                TriggerSlotDiff {
                    forward: Vec::new(),
                    reverse: Vec::new(),
                }
            } else {
                let mut forward = drop_instances(dialect, table, slot, old_trigger);
                forward.extend(create_instances(dialect, table, slot, current_trigger));
                let mut reverse = drop_instances(dialect, table, slot, current_trigger);
                reverse.extend(create_instances(dialect, table, slot, old_trigger));
                TriggerSlotDiff { forward, reverse }
            }
        }
    }
}
