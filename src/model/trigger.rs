// src/model/trigger.rs

//! Trigger model (part of C2) and the statement-normalization routine
//! shared by the snapshot view and DDL emission (see SPEC_FULL.md's Open
//! Question decision #3: both use the same normalized form, so the
//! checksum and the live database can never silently diverge).

use crate::error::{Error, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl TriggerEvent {
    pub fn as_sql(&self) -> &'static str {
        match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        }
    }

    pub fn as_lower(&self) -> &'static str {
        match self {
            TriggerEvent::Insert => "insert",
            TriggerEvent::Update => "update",
            TriggerEvent::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerTiming {
    Before,
    After,
}

impl TriggerTiming {
    pub fn as_sql(&self) -> &'static str {
        match self {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
        }
    }

    pub fn as_lower(&self) -> &'static str {
        match self {
            TriggerTiming::Before => "before",
            TriggerTiming::After => "after",
        }
    }
}

/// The six fixed trigger slots a model may populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSlot {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl TriggerSlot {
    pub const ALL: [TriggerSlot; 6] = [
        TriggerSlot::BeforeInsert,
        TriggerSlot::AfterInsert,
        TriggerSlot::BeforeUpdate,
        TriggerSlot::AfterUpdate,
        TriggerSlot::BeforeDelete,
        TriggerSlot::AfterDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSlot::BeforeInsert => "beforeInsert",
            TriggerSlot::AfterInsert => "afterInsert",
            TriggerSlot::BeforeUpdate => "beforeUpdate",
            TriggerSlot::AfterUpdate => "afterUpdate",
            TriggerSlot::BeforeDelete => "beforeDelete",
            TriggerSlot::AfterDelete => "afterDelete",
        }
    }

    pub fn timing(&self) -> TriggerTiming {
        match self {
            TriggerSlot::BeforeInsert | TriggerSlot::BeforeUpdate | TriggerSlot::BeforeDelete => {
                TriggerTiming::Before
            }
            TriggerSlot::AfterInsert | TriggerSlot::AfterUpdate | TriggerSlot::AfterDelete => {
                TriggerTiming::After
            }
        }
    }

    pub fn event(&self) -> TriggerEvent {
        match self {
            TriggerSlot::BeforeInsert | TriggerSlot::AfterInsert => TriggerEvent::Insert,
            TriggerSlot::BeforeUpdate | TriggerSlot::AfterUpdate => TriggerEvent::Update,
            TriggerSlot::BeforeDelete | TriggerSlot::AfterDelete => TriggerEvent::Delete,
        }
    }
}

/// One statement within a trigger: either a bare body or a `{body, when}`
/// pair with an optional row predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerStatement {
    pub body: String,
    pub when: Option<String>,
}

impl TriggerStatement {
    pub fn new(body: impl Into<String>, when: Option<String>) -> Self {
        Self {
            body: body.into(),
            when,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub statements: Vec<TriggerStatement>,
}

impl Trigger {
    pub fn for_slot(slot: TriggerSlot, statements: Vec<TriggerStatement>) -> Self {
        Self {
            timing: slot.timing(),
            event: slot.event(),
            statements,
        }
    }

    /// Canonical name for the i-th statement of this trigger (slot-scoped).
    pub fn instance_name(table: &str, slot: TriggerSlot, index: usize) -> String {
        format!(
            "trg_{table}_{}_{}_{index}",
            slot.event().as_lower(),
            slot.timing().as_lower()
        )
    }

    /// Reconstruct a trigger from its [`Trigger::canonical_view`] output.
    /// `body`/`when` are stored already-normalized, and `normalize_statement`/
    /// `normalize_when` are idempotent, so no special-casing is needed here.
    pub fn from_canonical_view(slot: TriggerSlot, value: &Value) -> Result<Self> {
        let statements = value
            .get("statements")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidSchema("trigger missing 'statements'".to_string()))?
            .iter()
            .map(|s| {
                let body = s
                    .get("body")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidSchema("trigger statement missing 'body'".to_string()))?;
                let when = s.get("when").and_then(Value::as_str).map(String::from);
                Ok(TriggerStatement::new(body, when))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Trigger::for_slot(slot, statements))
    }

    pub fn canonical_view(&self, table: &str, slot: TriggerSlot) -> Value {
        json!({
            "timing": self.timing.as_lower(),
            "event": self.event.as_lower(),
            "statements": self
                .statements
                .iter()
                .enumerate()
                .map(|(i, s)| json!({
                    "name": Trigger::instance_name(table, slot, i),
                    "body": normalize_statement(&s.body),
                    "when": s.when.as_deref().map(normalize_when),
                }))
                .collect::<Vec<_>>(),
        })
    }
}

/// Normalize a trigger statement body for stable hashing *and* for DDL
/// emission (SPEC_FULL.md Open Question decision #3): strip one layer of
/// enclosing quotes/backticks, collapse whitespace runs to a single space,
/// collapse any trailing semicolons to exactly one, and rewrite double
/// quotes to single quotes (inner single quotes are left untouched).
pub fn normalize_statement(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = strip_enclosing(trimmed);
    let collapsed = collapse_whitespace(stripped);
    let deduped_semicolons = collapsed.trim_end_matches(';').to_string() + ";";
    deduped_semicolons.replace('"', "'")
}

/// Normalize a `WHEN` predicate: strip a leading `WHEN` keyword
/// (case-insensitive), drop trailing semicolons, and wrap in parentheses.
pub fn normalize_when(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_keyword = if trimmed.len() >= 4 && trimmed[..4].eq_ignore_ascii_case("when") {
        trimmed[4..].trim_start()
    } else {
        trimmed
    };
    let without_semicolons = without_keyword.trim_end_matches(';').trim();
    let unwrapped = strip_enclosing_parens(without_semicolons);
    format!("({unwrapped})")
}

fn strip_enclosing(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        let is_quote_pair = matches!(first, b'"' | b'\'' | b'`') && first == last;
        if is_quote_pair {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn strip_enclosing_parens(s: &str) -> &str {
    let trimmed = s.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_name_round_trips() {
        assert_eq!(TriggerSlot::AfterInsert.as_str(), "afterInsert");
        assert_eq!(TriggerSlot::AfterInsert.event(), TriggerEvent::Insert);
        assert_eq!(TriggerSlot::AfterInsert.timing(), TriggerTiming::After);
    }

    #[test]
    fn instance_name_format() {
        assert_eq!(
            Trigger::instance_name("users", TriggerSlot::AfterInsert, 0),
            "trg_users_insert_after_0"
        );
    }

    #[test]
    fn normalize_statement_collapses_whitespace_and_quotes() {
        let raw = "  \"UPDATE  users   SET   name = \"\"x\"\" ;; \"  ";
        let normalized = normalize_statement(raw);
        assert!(normalized.ends_with(';'));
        assert!(!normalized.contains("  "));
        assert!(!normalized.contains('"'));
    }

    #[test]
    fn normalize_statement_collapses_trailing_semicolons() {
        let raw = "DELETE FROM logs;;;";
        assert_eq!(normalize_statement(raw), "DELETE FROM logs;");
    }

    #[test]
    fn normalize_when_strips_keyword_and_wraps() {
        assert_eq!(normalize_when("WHEN NEW.active = 1;"), "(NEW.active = 1)");
        assert_eq!(normalize_when("OLD.x > 0"), "(OLD.x > 0)");
    }
}
