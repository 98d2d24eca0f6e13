// src/model/schema.rs

//! Schema: the ordered mapping of model-key -> Model (the other half of
//! C2), plus the pre-checksum normalization spec.md §4.1 asks for.

use crate::canon;
use crate::error::Result;
use crate::model::{Index, Model};
use crate::ordered::OrderedMap;
use serde_json::Value;
use std::collections::HashSet;

/// An ordered mapping model-key -> Model. Ordering is established by the
/// dependency resolver (C4) before a `Schema` is constructed; `Schema`
/// itself never reorders its models.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: OrderedMap<Model>,
}

impl Schema {
    pub fn new(models: OrderedMap<Model>) -> Self {
        Self { models }
    }

    pub fn models(&self) -> &OrderedMap<Model> {
        &self.models
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Model)> {
        self.models.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Model> {
        self.models.get(key)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Locate a model by its *effective* table name, not its map key —
    /// this is how the differ matches old/current models (spec.md §4.5).
    pub fn find_by_effective_table(&self, table: &str) -> Option<(&str, &Model)> {
        self.models.iter().find(|(_, m)| m.effective_table_name() == table)
    }

    /// Reconstruct a schema from a [`Schema::canonical_view`] output — used
    /// to load `schema_snapshot.json` back into a `Schema` so the `create`
    /// lifecycle (C7) has a real old schema to diff against, not just a
    /// blob for checksumming.
    pub fn from_canonical_view(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| crate::error::Error::InvalidSchema("snapshot root must be an object".to_string()))?;
        let mut models = OrderedMap::new();
        for (key, model_value) in object {
            models.insert(key.clone(), Model::from_canonical_view(model_value)?);
        }
        Ok(Schema::new(models))
    }

    /// The on-disk snapshot format (spec.md §6): a mapping from model key to
    /// the canonical model view of §4.2.
    pub fn canonical_view(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, model) in self.models.iter() {
            map.insert(key.to_string(), model.canonical_view());
        }
        Value::Object(map)
    }

    pub fn checksum(&self) -> Result<String> {
        canon::checksum(&self.canonical_view())
    }

    /// spec.md §4.1: checksum both schemas after normalizing away index
    /// names that only differ because the old side carried an explicit
    /// name for an index the current side now leaves unnamed under the same
    /// `<sorted fields>|<unique?>` key. Clearing the old side's explicit
    /// name causes its effective name to be recomputed by the same
    /// auto-naming formula current uses, so a plain "I removed the
    /// override" edit hashes identically to a no-op; any other, more
    /// substantive difference still surfaces as a distinct checksum.
    pub fn prechecksum_checksums(old: &Schema, current: &Schema) -> Result<(String, String)> {
        let adjusted_old = old.strip_superseded_index_names(current);
        Ok((adjusted_old.checksum()?, current.checksum()?))
    }

    fn strip_superseded_index_names(&self, current: &Schema) -> Schema {
        let mut models = OrderedMap::new();
        for (key, model) in self.models.iter() {
            let mut model = model.clone();
            if let Some((_, current_model)) = current.find_by_effective_table(model.effective_table_name()) {
                let current_unnamed_keys: HashSet<String> = current_model
                    .meta
                    .indexes
                    .iter()
                    .filter(|idx| idx.name.is_none())
                    .map(Index::match_key)
                    .collect();
                for index in model.meta.indexes.iter_mut() {
                    if index.name.is_some() && current_unnamed_keys.contains(&index.match_key()) {
                        index.name = None;
                    }
                }
            }
            models.insert(key, model);
        }
        Schema::new(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldKind, FieldOptions, ModelMeta, TriggerSlot};
    use std::collections::HashMap;

    fn users_model(indexes: Vec<Index>) -> Model {
        let id = Field::new(
            "id",
            FieldKind::Integer,
            FieldOptions {
                primary_key: true,
                auto_increment: true,
                ..Default::default()
            },
        )
        .unwrap();
        Model::new(
            "users",
            vec![("id".into(), id)],
            vec![],
            HashMap::<TriggerSlot, crate::model::Trigger>::new(),
            ModelMeta {
                indexes,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn schema_of(model: Model) -> Schema {
        let mut models = OrderedMap::new();
        models.insert("users", model);
        Schema::new(models)
    }

    #[test]
    fn identical_schemas_hash_equal() {
        let a = schema_of(users_model(vec![Index::new(vec!["id".into()], true, None)]));
        let b = schema_of(users_model(vec![Index::new(vec!["id".into()], true, None)]));
        assert_eq!(a.checksum().unwrap(), b.checksum().unwrap());
    }

    #[test]
    fn removing_explicit_index_name_does_not_count_as_drift() {
        let old = schema_of(users_model(vec![Index::new(
            vec!["id".into()],
            true,
            Some("custom_name".into()),
        )]));
        let current = schema_of(users_model(vec![Index::new(vec!["id".into()], true, None)]));

        let (old_sum, current_sum) = Schema::prechecksum_checksums(&old, &current).unwrap();
        assert_eq!(old_sum, current_sum);
    }

    #[test]
    fn real_index_changes_still_surface() {
        let old = schema_of(users_model(vec![Index::new(vec!["id".into()], true, None)]));
        let current = schema_of(users_model(vec![
            Index::new(vec!["id".into()], true, None),
            Index::new(vec!["id".into()], false, Some("extra".into())),
        ]));
        let (old_sum, current_sum) = Schema::prechecksum_checksums(&old, &current).unwrap();
        assert_ne!(old_sum, current_sum);
    }
}
