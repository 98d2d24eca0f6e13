// src/differ/index.rs

//! Index diffing (part of C5 §4.5 "Meta").

use crate::dialect::Dialect;
use crate::model::Index;
use std::collections::HashMap;

pub struct IndexDiff {
    pub forward: Vec<String>,
    pub reverse: Vec<String>,
}

fn create_index_statement(dialect: Dialect, table: &str, index: &Index) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let name = index.effective_name(table);
    let cols: Vec<String> = index.fields.iter().map(|f| dialect.quote_ident(f)).collect();
    format!(
        "CREATE {unique}INDEX IF NOT EXISTS {} ON {}({});",
        dialect.quote_ident(&name),
        dialect.quote_ident(table),
        cols.join(", ")
    )
}

fn drop_index_statement(dialect: Dialect, _table: &str, name: &str) -> String {
    format!("DROP INDEX IF EXISTS {};", dialect.quote_ident(name))
}

/// Pair indexes by `Index::match_key` (field set + uniqueness, independent
/// of name) so a plain rename doesn't look like drop-then-add.
pub fn diff_indexes(dialect: Dialect, table: &str, old: &[Index], current: &[Index]) -> IndexDiff {
    let old_by_key: HashMap<String, &Index> = old.iter().map(|i| (i.match_key(), i)).collect();
    let current_by_key: HashMap<String, &Index> = current.iter().map(|i| (i.match_key(), i)).collect();

    let mut forward = Vec::new();
    let mut reverse = Vec::new();

    for index in current {
        if !old_by_key.contains_key(&index.match_key()) {
            forward.push(create_index_statement(dialect, table, index));
            reverse.push(drop_index_statement(dialect, table, &index.effective_name(table)));
        }
    }

    for index in old {
        if !current_by_key.contains_key(&index.match_key()) {
            forward.push(drop_index_statement(dialect, table, &index.effective_name(table)));
            reverse.push(create_index_statement(dialect, table, index));
        }
    }

    IndexDiff { forward, reverse }
}
