// src/differ/relation.rs

//! Relation diffing: the createNow/defer/error decision table and the DDL
//! for each outcome (part of C5 §4.5 "Relations").

use crate::dialect::Dialect;
use crate::exec::Introspector;
use crate::model::{Model, Relation, RelationKind, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    CreateNow,
    Defer,
    Error,
}

/// The single-column key a relation's `foreign_key` is assumed to
/// reference: the target model's own primary key, or `"id"` if the target
/// declares none explicitly (spec.md §3's Relation invariant: "the target
/// model must expose the referenced key").
pub fn target_key_column(target: &Model) -> String {
    target
        .primary_key_fields()
        .first()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "id".to_string())
}

/// spec.md §4.5's decision table. `target_defines_key` is true when the
/// target model (found in-batch) declares an explicit primary-key field.
pub fn decide(
    target_table: &str,
    target_key: &str,
    in_batch: bool,
    target_defines_key: bool,
    introspector: &dyn Introspector,
) -> Decision {
    let table_in_db = introspector.table_exists(target_table);
    let column_in_db = table_in_db && introspector.column_exists(target_table, target_key);

    match (table_in_db, column_in_db, in_batch, target_defines_key) {
        (true, true, _, _) => Decision::CreateNow,
        (true, false, true, true) => Decision::Defer,
        (true, false, true, false) => Decision::Error,
        (true, false, false, _) => Decision::Error,
        (false, _, true, true) => Decision::Defer,
        (false, _, true, false) => Decision::Error,
        (false, _, false, _) => Decision::Error,
    }
}

/// `target_in_batch`/`target_defines_key` convenience lookup against the
/// current schema.
pub fn target_in_batch(schema: &Schema, target_model_name: &str) -> Option<&Model> {
    schema.iter().find(|(_, m)| m.name == target_model_name).map(|(_, m)| m)
}

pub struct RelationStatements {
    pub forward: Vec<String>,
    pub reverse: Vec<String>,
}

/// One inline FK clause to fold into a `CREATE TABLE` (spec.md §4.5:
/// deferred relations injected into the owner's create, and — by this
/// crate's choice — any SQLite relation on a brand-new owner table, since
/// SQLite never supports `ADD CONSTRAINT` regardless of timing).
pub struct Inline {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// DDL for a `createNow` relation against an *existing* owner table.
pub fn create_now_statements(dialect: Dialect, owner_table: &str, relation: &Relation, referenced_column: &str) -> RelationStatements {
    let owner_ident = dialect.quote_ident(owner_table);
    match relation.kind {
        RelationKind::HasOne | RelationKind::HasMany => {
            let fk_name = format!("fk_{owner_table}_{}", relation.foreign_key);
            let idx_name = format!("idx_{owner_table}_{}", relation.foreign_key);
            let fk_col = dialect.quote_ident(&relation.foreign_key);
            let target_ident = dialect.quote_ident(&relation.target);
            let ref_col_ident = dialect.quote_ident(referenced_column);
            RelationStatements {
                forward: vec![
                    format!(
                        "ALTER TABLE {owner_ident} ADD CONSTRAINT {fk_name} FOREIGN KEY({fk_col}) REFERENCES {target_ident}({ref_col_ident});"
                    ),
                    format!("CREATE INDEX IF NOT EXISTS {idx_name} ON {owner_ident}({fk_col});"),
                ],
                reverse: vec![
                    format!("DROP INDEX IF EXISTS {idx_name};"),
                    format!("ALTER TABLE {owner_ident} DROP CONSTRAINT {fk_name};"),
                ],
            }
        }
        RelationKind::ManyToMany => {
            let through = relation.effective_through_table(owner_table);
            let through_ident = dialect.quote_ident(&through);
            let fk_col = dialect.quote_ident(&relation.foreign_key);
            let other_key = relation.other_key.as_deref().unwrap_or("id");
            let other_col = dialect.quote_ident(other_key);
            let target_ident = dialect.quote_ident(&relation.target);
            let ref_col_ident = dialect.quote_ident(referenced_column);
            RelationStatements {
                forward: vec![format!(
                    "CREATE TABLE IF NOT EXISTS {through_ident}({fk_col} INTEGER REFERENCES {owner_ident}({ref_col_ident}), {other_col} INTEGER REFERENCES {target_ident}({ref_col_ident}), PRIMARY KEY({fk_col},{other_col}));"
                )],
                reverse: vec![format!("DROP TABLE IF EXISTS {through_ident};")],
            }
        }
    }
}

/// Inline clause(s) for a relation folded into its owner's `CREATE TABLE`.
pub fn inline_clauses(relation: &Relation, owner_table: &str, referenced_column: &str) -> Vec<Inline> {
    match relation.kind {
        RelationKind::HasOne | RelationKind::HasMany => vec![Inline {
            column: relation.foreign_key.clone(),
            referenced_table: relation.target.clone(),
            referenced_column: referenced_column.to_string(),
        }],
        // manyToMany never inlines: its through table is independent DDL
        // emitted after the owner and target both exist.
        RelationKind::ManyToMany => {
            let _ = owner_table;
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeIntrospector {
        tables: Vec<(&'static str, Vec<&'static str>)>,
    }

    impl Introspector for FakeIntrospector {
        fn table_exists(&self, table: &str) -> bool {
            self.tables.iter().any(|(t, _)| *t == table)
        }
        fn column_exists(&self, table: &str, column: &str) -> bool {
            self.tables
                .iter()
                .find(|(t, _)| *t == table)
                .map(|(_, cols)| cols.contains(&column))
                .unwrap_or(false)
        }
        fn index_names(&self, _: &str) -> Vec<String> {
            Vec::new()
        }
        fn referencing_tables(&self, _: &str) -> Vec<String> {
            Vec::new()
        }
        fn trigger_bodies(&self) -> Vec<(String, String)> {
            Vec::new()
        }
    }

    #[test]
    fn target_table_and_column_in_db_creates_now() {
        let introspector = FakeIntrospector {
            tables: vec![("users", vec!["id"])],
        };
        assert_eq!(decide("users", "id", false, false, &introspector), Decision::CreateNow);
    }

    #[test]
    fn target_in_batch_with_key_defers() {
        let introspector = FakeIntrospector { tables: vec![] };
        assert_eq!(decide("users", "id", true, true, &introspector), Decision::Defer);
    }

    #[test]
    fn target_in_batch_without_key_errors() {
        let introspector = FakeIntrospector { tables: vec![] };
        assert_eq!(decide("users", "id", true, false, &introspector), Decision::Error);
    }

    #[test]
    fn target_nowhere_errors() {
        let introspector = FakeIntrospector { tables: vec![] };
        assert_eq!(decide("users", "id", false, false, &introspector), Decision::Error);
    }

    #[test]
    fn create_now_many_to_many_emits_through_table() {
        let relation = Relation::new(RelationKind::ManyToMany, "tags", "post_id", Some("tag_id".into()), None).unwrap();
        let stmts = create_now_statements(Dialect::Postgres, "posts", &relation, "id");
        assert!(stmts.forward[0].contains("posts_tags_link"));
        assert!(stmts.reverse[0].contains("DROP TABLE IF EXISTS \"posts_tags_link\""));
    }
}
