// src/validator.rs

//! Trigger-Body Validator (C8): confirms a trigger statement body only
//! references tables/columns that actually exist, without a real SQL
//! parser — just the leading keyword and a few well-known shapes.

use crate::error::{Error, Result};
use crate::exec::Introspector;
use crate::model::Schema;

struct Extracted {
    table: String,
    columns: Vec<String>,
    warn_join_or_subselect: bool,
}

fn strip_ident(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(',').trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if matches!(first, b'"' | b'\'' | b'`') && first == last {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

fn split_cols(inner: &str) -> Vec<String> {
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(strip_ident)
        .collect()
}

/// Pull the table name out of `... <t> (...)` / `... <t> SET ...` shapes:
/// the token immediately following the keyword prefix, stopping at the
/// next whitespace or open paren.
fn leading_table_token(rest: &str) -> (String, usize) {
    let rest = rest.trim_start();
    let consumed_ws = 0;
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(rest.len());
    (strip_ident(&rest[..end]), consumed_ws + end)
}

fn parse_insert(body: &str) -> Option<Extracted> {
    let upper = body.to_ascii_uppercase();
    let pos = upper.find("INSERT INTO")?;
    let rest = &body[pos + "INSERT INTO".len()..];
    let (table, consumed) = leading_table_token(rest);
    if table.is_empty() {
        return None;
    }
    let after = rest[consumed..].trim_start();
    let columns = if let Some(open) = after.find('(') {
        let close = after[open..].find(')').map(|i| i + open)?;
        split_cols(&after[open + 1..close])
    } else {
        Vec::new()
    };
    Some(Extracted {
        table,
        columns,
        warn_join_or_subselect: false,
    })
}

fn parse_update(body: &str) -> Option<Extracted> {
    let upper = body.to_ascii_uppercase();
    let pos = upper.find("UPDATE")?;
    let rest = &body[pos + "UPDATE".len()..];
    let (table, consumed) = leading_table_token(rest);
    if table.is_empty() {
        return None;
    }
    let after = &rest[consumed..];
    let after_upper = after.to_ascii_uppercase();
    let set_pos = after_upper.find("SET")?;
    let assignments = &after[set_pos + 3..];
    let where_upper = assignments.to_ascii_uppercase();
    let end = where_upper.find("WHERE").unwrap_or(assignments.len());
    let columns = assignments[..end]
        .split(',')
        .filter_map(|clause| clause.split('=').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(strip_ident)
        .collect();
    Some(Extracted {
        table,
        columns,
        warn_join_or_subselect: false,
    })
}

fn parse_delete(body: &str) -> Option<Extracted> {
    let upper = body.to_ascii_uppercase();
    let pos = upper.find("DELETE FROM")?;
    let rest = &body[pos + "DELETE FROM".len()..];
    let (table, _) = leading_table_token(rest);
    if table.is_empty() {
        return None;
    }
    Some(Extracted {
        table,
        columns: Vec::new(),
        warn_join_or_subselect: false,
    })
}

fn parse_select(body: &str) -> Option<Extracted> {
    let upper = body.to_ascii_uppercase();
    let pos = upper.find("SELECT")?;
    let from_pos = upper.find(" FROM ")?;
    let select_list = &body[pos + "SELECT".len()..from_pos];
    let rest = &body[from_pos + 6..];
    let (table, _) = leading_table_token(rest);
    if table.is_empty() {
        return None;
    }

    let rest_upper = rest.to_ascii_uppercase();
    let warn_join_or_subselect = rest_upper.contains("JOIN") || body.contains('(') && upper[from_pos..].contains("SELECT");

    let trimmed_list = select_list.trim();
    let columns = if trimmed_list == "*" {
        Vec::new()
    } else {
        trimmed_list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "*")
            .map(strip_ident)
            .collect()
    };

    Some(Extracted {
        table,
        columns,
        warn_join_or_subselect,
    })
}

fn extract(body: &str) -> Option<Extracted> {
    parse_insert(body)
        .or_else(|| parse_update(body))
        .or_else(|| parse_delete(body))
        .or_else(|| parse_select(body))
}

/// Validate one trigger statement body. Returns `(deferred, warnings)` on
/// success: `deferred` is true when the referenced table is only in the
/// current batch and not yet in the live database, meaning the whole
/// trigger this statement belongs to must wait for the relation pass.
/// `InvalidTrigger` is raised when a referenced table/column cannot be
/// confirmed at all. Statements the validator can't classify (`other` in
/// spec's leading-token table) are assumed safe and skipped.
pub fn validate_statement(
    body: &str,
    schema: &Schema,
    introspector: &dyn Introspector,
) -> Result<(bool, Vec<String>)> {
    let Some(extracted) = extract(body) else {
        return Ok((false, Vec::new()));
    };

    let mut warnings = Vec::new();
    if extracted.warn_join_or_subselect {
        warnings.push(format!(
            "trigger statement against '{}' contains a JOIN or subselect; validator cannot confirm every referenced column",
            extracted.table
        ));
    }

    if introspector.table_exists(&extracted.table) {
        for column in &extracted.columns {
            if !introspector.column_exists(&extracted.table, column) {
                return Err(Error::InvalidTrigger(format!(
                    "trigger references column '{}' on table '{}' which does not exist",
                    column, extracted.table
                )));
            }
        }
        Ok((false, warnings))
    } else if let Some((_, model)) = schema.find_by_effective_table(&extracted.table) {
        for column in &extracted.columns {
            if !model.fields.contains_key(column) {
                return Err(Error::InvalidTrigger(format!(
                    "trigger references column '{}' on model '{}' which defines no such field",
                    column, model.name
                )));
            }
        }
        Ok((true, warnings))
    } else {
        Err(Error::InvalidTrigger(format!(
            "trigger references table '{}' which is neither in the database nor the current batch",
            extracted.table
        )))
    }
}
