// src/differ/table.rs

//! New-table creation and its reverse (part of C5 §4.5 "New table").

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::Model;

/// `<name> <type> [PRIMARY KEY [AUTOINCREMENT]] [UNIQUE] [NOT NULL] [DEFAULT ...]`
/// for a `CREATE TABLE` column list. The single-column auto-increment
/// primary key gets the dialect's inline form; everything else gets a
/// table-level `PRIMARY KEY (...)` clause appended by the caller.
fn column_definition(dialect: Dialect, table: &str, field: &crate::model::Field, inline_pk: bool) -> (String, Option<String>) {
    let ident = dialect.quote_ident(&field.name);

    if inline_pk && field.primary_key && field.auto_increment {
        let base = dialect.render_type(&field.kind);
        let clause = dialect.auto_increment_primary_key_clause(&base);
        let mut parts = vec![ident, clause];
        if !field.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &field.default {
            parts.push(format!("DEFAULT {}", dialect.render_default(default)));
        }
        return (parts.join(" "), None);
    }

    let (type_clause, preamble) = super::column::bare_type_clause(dialect, table, field);
    let mut parts = vec![ident, type_clause];
    if field.unique && !field.primary_key {
        parts.push("UNIQUE".to_string());
    }
    if !field.nullable {
        parts.push("NOT NULL".to_string());
    }
    if let Some(default) = &field.default {
        parts.push(format!("DEFAULT {}", dialect.render_default(default)));
    }
    (parts.join(" "), preamble)
}

/// One inline table-level FK clause for a relation whose owning table is
/// being created in this same statement (deferred relation resolved at
/// create time — spec.md §4.5 "New table" / S4).
pub struct InlineForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// `CREATE TABLE IF NOT EXISTS <table> ( ... );` plus `DROP TABLE IF
/// EXISTS <table>;` as its reverse. A composite primary key combined with
/// auto-increment is rejected (`Model::new` already enforces this for a
/// single model, but a caller constructing ad hoc models must still see
/// the same error here).
pub fn create_table(dialect: Dialect, model: &Model, inline_fks: &[InlineForeignKey]) -> Result<(Vec<String>, Vec<String>)> {
    let table = model.effective_table_name();
    let table_ident = dialect.quote_ident(table);
    let pk_fields = model.primary_key_fields();
    let auto_increment_count = model.fields.values().filter(|f| f.auto_increment).count();

    if auto_increment_count > 0 && pk_fields.len() > 1 {
        return Err(Error::InvalidSchema(format!(
            "model '{}': auto_increment cannot combine with a composite primary key",
            model.name
        )));
    }

    let inline_pk = pk_fields.len() == 1 && auto_increment_count == 1;

    let mut preambles = Vec::new();
    let mut columns = Vec::new();
    for field in model.fields.values() {
        let (clause, preamble) = column_definition(dialect, table, field, inline_pk);
        if let Some(p) = preamble {
            preambles.push(p);
        }
        columns.push(clause);
    }

    if !inline_pk && pk_fields.len() > 1 {
        let quoted: Vec<String> = pk_fields.iter().map(|f| dialect.quote_ident(f)).collect();
        columns.push(format!("PRIMARY KEY ({})", quoted.join(", ")));
    }

    for fk in inline_fks {
        columns.push(format!(
            "FOREIGN KEY({}) REFERENCES {}({})",
            dialect.quote_ident(&fk.column),
            dialect.quote_ident(&fk.referenced_table),
            dialect.quote_ident(&fk.referenced_column),
        ));
    }

    let mut forward = preambles;
    forward.push(format!(
        "CREATE TABLE IF NOT EXISTS {table_ident} ( {} );",
        columns.join(", ")
    ));

    let reverse = vec![format!("DROP TABLE IF EXISTS {table_ident};")];

    Ok((forward, reverse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldKind, FieldOptions, ModelMeta, TriggerSlot};
    use std::collections::HashMap;

    fn users_model() -> Model {
        let id = crate::model::Field::new(
            "id",
            FieldKind::Integer,
            FieldOptions {
                primary_key: true,
                auto_increment: true,
                ..Default::default()
            },
        )
        .unwrap();
        let email = crate::model::Field::new(
            "email",
            FieldKind::Varchar { max_length: None },
            FieldOptions {
                unique: true,
                ..Default::default()
            },
        )
        .unwrap();
        let level = crate::model::Field::new(
            "level",
            FieldKind::Enum {
                choices: vec!["A".into(), "B".into()],
            },
            FieldOptions {
                default: Some(crate::model::DefaultValue::String("A".into())),
                ..Default::default()
            },
        )
        .unwrap();
        Model::new(
            "users",
            vec![("id".into(), id), ("email".into(), email), ("level".into(), level)],
            vec![],
            HashMap::<TriggerSlot, crate::model::Trigger>::new(),
            ModelMeta::default(),
        )
        .unwrap()
    }

    #[test]
    fn sqlite_new_table_matches_worked_example_shape() {
        let (forward, reverse) = create_table(Dialect::Sqlite, &users_model(), &[]).unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(
            forward[0],
            "CREATE TABLE IF NOT EXISTS users ( id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, email VARCHAR UNIQUE NOT NULL, level TEXT CHECK(level IN ('A','B')) NOT NULL DEFAULT 'A' );"
        );
        assert_eq!(reverse, vec!["DROP TABLE IF EXISTS users;"]);
    }

    #[test]
    fn composite_pk_with_auto_increment_is_rejected() {
        let id = crate::model::Field::new(
            "id",
            FieldKind::Integer,
            FieldOptions {
                primary_key: true,
                auto_increment: true,
                ..Default::default()
            },
        )
        .unwrap();
        let tenant = crate::model::Field::new(
            "tenant_id",
            FieldKind::Integer,
            FieldOptions {
                primary_key: true,
                ..Default::default()
            },
        )
        .unwrap();
        // Bypass Model::new's own guard by constructing fields directly is not
        // possible (private fields), so this exercises the guard via the
        // normal constructor and expects it to already have failed there.
        let result = Model::new(
            "t",
            vec![("id".into(), id), ("tenant_id".into(), tenant)],
            vec![],
            HashMap::<TriggerSlot, crate::model::Trigger>::new(),
            ModelMeta::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn composite_pk_without_auto_increment_uses_table_level_clause() {
        let a = crate::model::Field::new(
            "a",
            FieldKind::Integer,
            FieldOptions {
                primary_key: true,
                ..Default::default()
            },
        )
        .unwrap();
        let b = crate::model::Field::new(
            "b",
            FieldKind::Integer,
            FieldOptions {
                primary_key: true,
                ..Default::default()
            },
        )
        .unwrap();
        let model = Model::new(
            "link",
            vec![("a".into(), a), ("b".into(), b)],
            vec![],
            HashMap::<TriggerSlot, crate::model::Trigger>::new(),
            ModelMeta::default(),
        )
        .unwrap();
        let (forward, _) = create_table(Dialect::Postgres, &model, &[]).unwrap();
        assert!(forward[0].contains("PRIMARY KEY (\"a\", \"b\")"));
    }
}
