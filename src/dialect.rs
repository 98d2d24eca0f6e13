// src/dialect.rs

//! Dialect Adapter (C3): the variants — identifier quoting, auto-increment,
//! enum representation, trigger-body emission, and (in `rebuild.rs`) SQLite
//! table-rebuild policy — that make the rest of the engine dialect-neutral.

use crate::error::{Error, Result};
use crate::model::field::{DefaultValue, FieldKind};
use crate::model::trigger::{TriggerEvent, TriggerTiming};
use sha1::{Digest as Sha1Digest, Sha1};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
}

impl Dialect {
    /// Parse `DATABASE_ENGINE` (case-insensitive).
    pub fn from_env_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(Error::DialectUnsupported(other.to_string())),
        }
    }

    /// Quote an identifier. Postgres/MySQL always quote with double quotes
    /// (backticks would be more idiomatic MySQL, but `"ident"` also works
    /// under ANSI_QUOTES and keeps the three dialects' generated SQL
    /// visually uniform, which is what this engine's diff output promises
    /// callers). SQLite leaves a plain identifier unquoted.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::Sqlite if is_plain_identifier(ident) => ident.to_string(),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Render a column default clause (without the `DEFAULT` keyword).
    pub fn render_default(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::String(s) => format!("'{}'", s.replace('\'', "''")),
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::Bool(b) => match self {
                Dialect::Sqlite => if *b { "1" } else { "0" }.to_string(),
                _ => if *b { "TRUE" } else { "FALSE" }.to_string(),
            },
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::SqlFunction(token) => token.clone(),
        }
    }

    /// Render the bare column type, ignoring auto-increment (handled
    /// separately by [`Dialect::primary_key_column_clause`]) and enums
    /// (handled by [`Dialect::enum_column_clause`]).
    pub fn render_type(&self, kind: &FieldKind) -> String {
        match kind {
            FieldKind::Integer => "INTEGER".to_string(),
            FieldKind::Decimal { precision, scale } => format!("DECIMAL({precision},{scale})"),
            FieldKind::Float => match self {
                Dialect::Postgres => "DOUBLE PRECISION".to_string(),
                Dialect::Mysql => "DOUBLE".to_string(),
                Dialect::Sqlite => "REAL".to_string(),
            },
            FieldKind::Varchar { max_length } => match max_length {
                Some(n) => format!("VARCHAR({n})"),
                None => "VARCHAR".to_string(),
            },
            FieldKind::Text => "TEXT".to_string(),
            FieldKind::Enum { .. } => unreachable!("enum columns are rendered via enum_column_clause"),
            FieldKind::Date => "DATE".to_string(),
            FieldKind::DateTime => match self {
                Dialect::Postgres => "TIMESTAMP".to_string(),
                Dialect::Mysql => "DATETIME".to_string(),
                Dialect::Sqlite => "TEXT".to_string(),
            },
            FieldKind::Blob => match self {
                Dialect::Postgres => "BYTEA".to_string(),
                Dialect::Mysql | Dialect::Sqlite => "BLOB".to_string(),
            },
            FieldKind::Boolean => match self {
                Dialect::Postgres => "BOOLEAN".to_string(),
                Dialect::Mysql => "TINYINT(1)".to_string(),
                Dialect::Sqlite => "INTEGER".to_string(),
            },
            FieldKind::Uuid => match self {
                Dialect::Postgres => "UUID".to_string(),
                Dialect::Mysql | Dialect::Sqlite => "VARCHAR(36)".to_string(),
            },
            FieldKind::Json => match self {
                Dialect::Postgres => "JSONB".to_string(),
                Dialect::Mysql => "JSON".to_string(),
                Dialect::Sqlite => "TEXT".to_string(),
            },
            FieldKind::Xml => match self {
                Dialect::Postgres => "XML".to_string(),
                Dialect::Mysql | Dialect::Sqlite => "TEXT".to_string(),
            },
        }
    }

    /// `CREATE TYPE`/inline/`CHECK` representation for an enum column.
    /// Returns `(column_type_fragment, optional_preamble_statement)` —
    /// Postgres returns a `CREATE TYPE` preamble; MySQL/SQLite return none.
    pub fn enum_column_clause(
        &self,
        table: &str,
        column: &str,
        choices: &[String],
        explicit_type_name: Option<&str>,
    ) -> (String, Option<String>) {
        match self {
            Dialect::Postgres => {
                let type_name = explicit_type_name
                    .map(str::to_string)
                    .unwrap_or_else(|| enum_type_name(table, column, choices));
                let values = choices
                    .iter()
                    .map(|c| format!("'{}'", c.replace('\'', "''")))
                    .collect::<Vec<_>>()
                    .join(", ");
                let preamble = format!("CREATE TYPE {type_name} AS ENUM ({values});");
                (type_name, Some(preamble))
            }
            Dialect::Mysql => {
                let values = choices
                    .iter()
                    .map(|c| format!("'{}'", c.replace('\'', "''")))
                    .collect::<Vec<_>>()
                    .join(", ");
                (format!("ENUM({values})"), None)
            }
            Dialect::Sqlite => {
                let values = choices
                    .iter()
                    .map(|c| format!("'{}'", c.replace('\'', "''")))
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("TEXT CHECK({} IN ({values}))", self.quote_ident(column)),
                    None,
                )
            }
        }
    }

    /// The inline `<type> PRIMARY KEY [AUTOINCREMENT]` fragment for a
    /// single-column auto-increment primary key.
    pub fn auto_increment_primary_key_clause(&self, base_type: &str) -> String {
        match self {
            Dialect::Postgres => "SERIAL PRIMARY KEY".to_string(),
            Dialect::Mysql => format!("{base_type} AUTO_INCREMENT PRIMARY KEY"),
            Dialect::Sqlite => format!("{base_type} PRIMARY KEY AUTOINCREMENT"),
        }
    }

    /// Render the `CREATE [OR REPLACE FUNCTION +] TRIGGER` statement(s) for
    /// one trigger instance. The body and `when` predicate are expected to
    /// already be normalized (`model::trigger::normalize_statement` /
    /// `normalize_when`) — SPEC_FULL.md's Open Question decision #3 applies
    /// the same normalization to emitted DDL as to the stored checksum, so
    /// the two can never silently drift apart.
    pub fn render_trigger(
        &self,
        name: &str,
        timing: TriggerTiming,
        event: TriggerEvent,
        table: &str,
        body: &str,
        when: Option<&str>,
    ) -> Vec<String> {
        let body = body.trim_end_matches(';');
        let when_clause = when.map(|w| format!(" WHEN {w}")).unwrap_or_default();

        match self {
            Dialect::Postgres => {
                let func_name = format!("{name}_func");
                let returning = if event == TriggerEvent::Delete { "OLD" } else { "NEW" };
                let func = format!(
                    "CREATE OR REPLACE FUNCTION {func_name}() RETURNS trigger AS $$ BEGIN {body}; RETURN {returning}; END; $$ LANGUAGE plpgsql;"
                );
                let trig = format!(
                    "CREATE TRIGGER {name} {} {} ON {table} FOR EACH ROW{when_clause} EXECUTE FUNCTION {func_name}();",
                    timing.as_sql(),
                    event.as_sql(),
                );
                vec![func, trig]
            }
            Dialect::Mysql | Dialect::Sqlite => {
                vec![format!(
                    "CREATE TRIGGER {name} {} {} ON {table} FOR EACH ROW{when_clause} BEGIN {body}; END;",
                    timing.as_sql(),
                    event.as_sql(),
                )]
            }
        }
    }

    /// Statement(s) to drop one trigger instance (and, for Postgres, its
    /// backing function).
    pub fn render_drop_trigger(&self, name: &str, table: &str) -> Vec<String> {
        match self {
            Dialect::Postgres => vec![
                format!("DROP TRIGGER IF EXISTS {name} ON {table};"),
                format!("DROP FUNCTION IF EXISTS {name}_func();"),
            ],
            Dialect::Mysql | Dialect::Sqlite => vec![format!("DROP TRIGGER IF EXISTS {name};")],
        }
    }
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Deterministic Postgres enum type name: `enum_<table>_<column>_<8 hex>`,
/// where the hex is the first 8 chars of SHA-1 over
/// `<table>_<column>:<choices-sorted-joined-by-pipe>` (spec.md §4.3).
pub fn enum_type_name(table: &str, column: &str, choices: &[String]) -> String {
    let mut sorted = choices.to_vec();
    sorted.sort();
    let input = format!("{table}_{column}:{}", sorted.join("|"));
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let hex = hex::encode(digest);
    format!("enum_{table}_{column}_{}", &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_leaves_plain_identifiers_unquoted() {
        assert_eq!(Dialect::Sqlite.quote_ident("users"), "users");
        assert_eq!(Dialect::Sqlite.quote_ident("user table"), "\"user table\"");
    }

    #[test]
    fn postgres_always_quotes() {
        assert_eq!(Dialect::Postgres.quote_ident("users"), "\"users\"");
    }

    #[test]
    fn enum_type_name_is_deterministic_and_order_independent() {
        let a = enum_type_name("users", "level", &["A".into(), "B".into()]);
        let b = enum_type_name("users", "level", &["B".into(), "A".into()]);
        assert_eq!(a, b);
        assert!(a.starts_with("enum_users_level_"));
        assert_eq!(a.len(), "enum_users_level_".len() + 8);
    }

    #[test]
    fn postgres_trigger_emits_function_and_trigger() {
        let stmts = Dialect::Postgres.render_trigger(
            "trg_users_insert_after_0",
            TriggerTiming::After,
            TriggerEvent::Insert,
            "users",
            "UPDATE stats SET n = n + 1",
            None,
        );
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("CREATE OR REPLACE FUNCTION"));
        assert!(stmts[0].contains("RETURN NEW"));
        assert!(stmts[1].contains("EXECUTE FUNCTION"));
    }

    #[test]
    fn delete_trigger_returns_old() {
        let stmts = Dialect::Postgres.render_trigger(
            "trg_users_delete_after_0",
            TriggerTiming::After,
            TriggerEvent::Delete,
            "users",
            "DELETE FROM archive",
            None,
        );
        assert!(stmts[0].contains("RETURN OLD"));
    }

    #[test]
    fn sqlite_trigger_is_single_statement_with_when() {
        let stmts = Dialect::Sqlite.render_trigger(
            "trg_users_update_before_0",
            TriggerTiming::Before,
            TriggerEvent::Update,
            "users",
            "SELECT 1",
            Some("(NEW.active = 1)"),
        );
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].contains("WHEN (NEW.active = 1)"));
    }
}
