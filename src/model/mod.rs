// src/model/mod.rs

//! Model & Field Model (C2): in-memory schema entities and their
//! invariants. Constructors validate and freeze; nothing here is mutated
//! after normalization (spec.md §3 Lifecycles).

pub mod field;
pub mod index;
pub mod params;
pub mod relation;
pub mod schema;
pub mod trigger;

pub use field::{DefaultValue, Field, FieldKind, FieldOptions};
pub use index::Index;
pub use relation::{Relation, RelationKind};
pub use schema::Schema;
pub use trigger::{Trigger, TriggerEvent, TriggerSlot, TriggerStatement, TriggerTiming};

use crate::error::{Error, Result};
use crate::ordered::OrderedMap;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Metadata attached to a model beyond its fields/relations/triggers.
#[derive(Debug, Clone, Default)]
pub struct ModelMeta {
    pub table_name: Option<String>,
    pub indexes: Vec<Index>,
    pub comment: Option<String>,
    pub timestamps: bool,
}

/// A table: an ordered mapping of field name -> Field, relations, the six
/// trigger slots, and metadata. Built once per process and never mutated.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub fields: OrderedMap<Field>,
    pub relations: OrderedMap<Relation>,
    pub triggers: HashMap<TriggerSlot, Trigger>,
    pub meta: ModelMeta,
}

impl Model {
    pub fn new(
        name: impl Into<String>,
        fields: Vec<(String, Field)>,
        relations: Vec<(String, Relation)>,
        triggers: HashMap<TriggerSlot, Trigger>,
        meta: ModelMeta,
    ) -> Result<Self> {
        let name = name.into();

        let mut field_map = OrderedMap::new();
        for (key, field) in fields {
            field_map.insert(key, field);
        }

        let auto_increment_count = field_map.values().filter(|f| f.auto_increment).count();
        let primary_key_count = field_map.values().filter(|f| f.primary_key).count();
        if auto_increment_count > 0 && primary_key_count > 1 {
            return Err(Error::InvalidSchema(format!(
                "model '{name}': auto_increment cannot combine with a composite primary key"
            )));
        }

        let mut relation_map = OrderedMap::new();
        for (key, relation) in relations {
            relation_map.insert(key, relation);
        }

        Ok(Self {
            name,
            fields: field_map,
            relations: relation_map,
            triggers,
            meta,
        })
    }

    /// `meta.tableName` if present, else the model name (spec.md glossary:
    /// "Effective table name").
    pub fn effective_table_name(&self) -> &str {
        self.meta.table_name.as_deref().unwrap_or(&self.name)
    }

    pub fn primary_key_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.primary_key)
            .map(|(name, _)| name)
            .collect()
    }

    /// Reconstruct a model from its [`Model::canonical_view`] output.
    /// `meta.tableName` always comes back explicit (the view stores the
    /// already-resolved `effective_table_name`), which is harmless since
    /// `effective_table_name` produces the same string either way.
    pub fn from_canonical_view(value: &Value) -> Result<Self> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidSchema("model missing 'name'".to_string()))?;

        let mut fields = Vec::new();
        if let Some(map) = value.get("fields").and_then(Value::as_object) {
            for (field_name, field_value) in map {
                fields.push((field_name.clone(), Field::from_canonical_view(field_name, field_value)?));
            }
        }

        let mut relations = Vec::new();
        if let Some(map) = value.get("relations").and_then(Value::as_object) {
            for (rel_name, rel_value) in map {
                relations.push((rel_name.clone(), Relation::from_canonical_view(rel_value)?));
            }
        }

        let mut triggers = HashMap::new();
        if let Some(map) = value.get("triggers").and_then(Value::as_object) {
            for slot in TriggerSlot::ALL {
                if let Some(trigger_value) = map.get(slot.as_str()) {
                    triggers.insert(slot, Trigger::from_canonical_view(slot, trigger_value)?);
                }
            }
        }

        let indexes = value
            .get("indexes")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(Index::from_canonical_view).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();

        let meta = ModelMeta {
            table_name: value.get("tableName").and_then(Value::as_str).map(String::from),
            indexes,
            comment: value.get("comment").and_then(Value::as_str).map(String::from),
            timestamps: value.get("timestamps").and_then(Value::as_bool).unwrap_or(false),
        };

        Model::new(name, fields, relations, triggers, meta)
    }

    /// Deterministic JSON view, excluding help text and (in Rust, moot)
    /// user methods. This is what gets written to `schema_snapshot.json`
    /// and fed into the C1 checksum.
    pub fn canonical_view(&self) -> Value {
        let table = self.effective_table_name();

        let mut fields = serde_json::Map::new();
        for (name, field) in self.fields.iter() {
            fields.insert(name.to_string(), field.canonical_view());
        }

        let mut relations = serde_json::Map::new();
        for (name, relation) in self.relations.iter() {
            relations.insert(name.to_string(), relation.canonical_view(table));
        }

        let mut triggers = serde_json::Map::new();
        for slot in TriggerSlot::ALL {
            if let Some(trigger) = self.triggers.get(&slot) {
                triggers.insert(slot.as_str().to_string(), trigger.canonical_view(table, slot));
            }
        }

        json!({
            "name": self.name,
            "tableName": table,
            "fields": fields,
            "relations": relations,
            "triggers": triggers,
            "indexes": self.meta.indexes.iter().map(|i| i.canonical_view(table)).collect::<Vec<_>>(),
            "comment": self.meta.comment,
            "timestamps": self.meta.timestamps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use field::FieldOptions;

    fn int_field(name: &str, pk: bool, auto: bool) -> Field {
        Field::new(
            name,
            FieldKind::Integer,
            FieldOptions {
                primary_key: pk,
                auto_increment: auto,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn effective_table_name_falls_back_to_model_name() {
        let model = Model::new(
            "users",
            vec![("id".into(), int_field("id", true, true))],
            vec![],
            HashMap::new(),
            ModelMeta::default(),
        )
        .unwrap();
        assert_eq!(model.effective_table_name(), "users");
    }

    #[test]
    fn effective_table_name_honors_override() {
        let model = Model::new(
            "users",
            vec![("id".into(), int_field("id", true, true))],
            vec![],
            HashMap::new(),
            ModelMeta {
                table_name: Some("app_users".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(model.effective_table_name(), "app_users");
    }

    #[test]
    fn rejects_composite_primary_key_with_auto_increment() {
        let err = Model::new(
            "users",
            vec![
                ("id".into(), int_field("id", true, true)),
                ("tenant_id".into(), int_field("tenant_id", true, false)),
            ],
            vec![],
            HashMap::new(),
            ModelMeta::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn canonical_view_excludes_help_text_and_is_deterministic() {
        let model = Model::new(
            "users",
            vec![("id".into(), int_field("id", true, true))],
            vec![],
            HashMap::new(),
            ModelMeta::default(),
        )
        .unwrap();
        let a = serde_json::to_string(&model.canonical_view()).unwrap();
        let b = serde_json::to_string(&model.canonical_view()).unwrap();
        assert_eq!(a, b);
    }
}
