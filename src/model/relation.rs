// src/model/relation.rs

//! Relation model (part of C2).

use crate::error::{Error, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    HasMany,
    ManyToMany,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::HasOne => "hasOne",
            RelationKind::HasMany => "hasMany",
            RelationKind::ManyToMany => "manyToMany",
        }
    }
}

/// A unidirectional relation declared on the owning ("parent-side") model.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub kind: RelationKind,
    pub target: String,
    pub foreign_key: String,
    /// manyToMany only: the column on the through table referencing the
    /// target model's key.
    pub other_key: Option<String>,
    /// manyToMany only: explicit through-table name, if the user supplied
    /// one. When absent, the effective name is `<base>_<target>_link`.
    pub through_table: Option<String>,
}

impl Relation {
    pub fn new(
        kind: RelationKind,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        other_key: Option<String>,
        through_table: Option<String>,
    ) -> Result<Self> {
        let target = target.into();
        let foreign_key = foreign_key.into();

        if target.trim().is_empty() {
            return Err(Error::InvalidRelation(
                "relation target must not be empty".to_string(),
            ));
        }
        if foreign_key.trim().is_empty() {
            return Err(Error::InvalidRelation(
                "relation foreign_key must not be empty".to_string(),
            ));
        }
        if kind == RelationKind::ManyToMany && other_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(Error::InvalidRelation(
                "manyToMany relation requires an other_key".to_string(),
            ));
        }

        Ok(Self {
            kind,
            target,
            foreign_key,
            other_key,
            through_table,
        })
    }

    /// Reconstruct a relation from its [`Relation::canonical_view`] output.
    /// `throughTable` always round-trips as an explicit value (the view
    /// stores the already-resolved `effective_through_table`), which is
    /// harmless since that resolved name is what the relation means either
    /// way.
    pub fn from_canonical_view(value: &Value) -> Result<Self> {
        let kind = match value.get("kind").and_then(Value::as_str) {
            Some("hasOne") => RelationKind::HasOne,
            Some("hasMany") => RelationKind::HasMany,
            Some("manyToMany") => RelationKind::ManyToMany,
            other => {
                return Err(Error::InvalidRelation(format!(
                    "unrecognized relation kind {other:?}"
                )))
            }
        };
        let target = value
            .get("target")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRelation("relation missing 'target'".to_string()))?;
        let foreign_key = value
            .get("foreignKey")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRelation("relation missing 'foreignKey'".to_string()))?;
        let other_key = value
            .get("otherKey")
            .and_then(Value::as_str)
            .map(String::from);
        let through_table = value
            .get("throughTable")
            .and_then(Value::as_str)
            .map(String::from);
        Relation::new(kind, target, foreign_key, other_key, through_table)
    }

    /// The join-table name for a manyToMany relation: the user's explicit
    /// name, or `<base>_<target>_link`.
    pub fn effective_through_table(&self, base_table: &str) -> String {
        self.through_table
            .clone()
            .unwrap_or_else(|| format!("{base_table}_{}_link", self.target))
    }

    pub fn canonical_view(&self, base_table: &str) -> Value {
        json!({
            "kind": self.kind.as_str(),
            "target": self.target,
            "foreignKey": self.foreign_key,
            "otherKey": self.other_key,
            "throughTable": if self.kind == RelationKind::ManyToMany {
                Some(self.effective_through_table(base_table))
            } else {
                None
            },
        })
    }
}
