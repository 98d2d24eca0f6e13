// src/resolver.rs

//! Dependency Resolver (C4): topological sort of models by FK reference,
//! so a model is always created before anything that references it.

use crate::error::{Error, Result};
use crate::model::{Model, Schema};
use crate::ordered::OrderedMap;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    InProgress,
    Done,
}

/// Order `models` (keyed by their host-side map key) so that every model a
/// relation points at precedes the model that declares the relation.
/// Independent models keep their input insertion order; a back-edge during
/// the DFS raises `CyclicSchema` carrying the full cycle path.
pub fn resolve(models: &OrderedMap<Model>) -> Result<Schema> {
    let name_to_key: HashMap<&str, &str> = models.iter().map(|(key, model)| (model.name.as_str(), key)).collect();

    let mut state: HashMap<String, State> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for key in models.keys() {
        if !state.contains_key(key) {
            let mut path = Vec::new();
            visit(key, models, &name_to_key, &mut state, &mut order, &mut path)?;
        }
    }

    let mut ordered = OrderedMap::new();
    for key in order {
        if let Some(model) = models.get(&key) {
            ordered.insert(key, model.clone());
        }
    }
    Ok(Schema::new(ordered))
}

fn visit(
    key: &str,
    models: &OrderedMap<Model>,
    name_to_key: &HashMap<&str, &str>,
    state: &mut HashMap<String, State>,
    order: &mut Vec<String>,
    path: &mut Vec<String>,
) -> Result<()> {
    match state.get(key) {
        Some(State::Done) => return Ok(()),
        Some(State::InProgress) => {
            let start = path.iter().position(|k| k == key).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].to_vec();
            cycle.push(key.to_string());
            return Err(Error::CyclicSchema(cycle));
        }
        None => {}
    }

    state.insert(key.to_string(), State::InProgress);
    path.push(key.to_string());

    if let Some(model) = models.get(key) {
        for (_, relation) in model.relations.iter() {
            // A model referencing its own key (e.g. a self-referential
            // parent/child FK) is not an ordering cycle — the table is
            // created once and can reference a column of itself.
            if relation.target == model.name {
                continue;
            }
            if let Some(&target_key) = name_to_key.get(relation.target.as_str()) {
                visit(target_key, models, name_to_key, state, order, path)?;
            }
            // A target outside this batch (unknown model name) introduces
            // no ordering edge at all: it is either already in the
            // database or the relation will be deferred (C5/C8), neither
            // of which this resolver needs to sequence.
        }
    }

    path.pop();
    state.insert(key.to_string(), State::Done);
    order.push(key.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldKind, FieldOptions, ModelMeta, Relation, RelationKind, TriggerSlot};
    use std::collections::HashMap as StdHashMap;

    fn pk() -> Field {
        Field::new(
            "id",
            FieldKind::Integer,
            FieldOptions {
                primary_key: true,
                auto_increment: true,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn model(name: &str, relations: Vec<(&str, Relation)>) -> Model {
        Model::new(
            name,
            vec![("id".into(), pk())],
            relations.into_iter().map(|(k, r)| (k.to_string(), r)).collect(),
            StdHashMap::<TriggerSlot, crate::model::Trigger>::new(),
            ModelMeta::default(),
        )
        .unwrap()
    }

    #[test]
    fn independent_models_preserve_insertion_order() {
        let mut models = OrderedMap::new();
        models.insert("b", model("b", vec![]));
        models.insert("a", model("a", vec![]));
        let schema = resolve(&models).unwrap();
        assert_eq!(schema.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn dependency_is_ordered_before_dependent() {
        let posts_to_users =
            Relation::new(RelationKind::HasOne, "users", "user_id", None, None).unwrap();
        let mut models = OrderedMap::new();
        models.insert("posts", model("posts", vec![("author", posts_to_users)]));
        models.insert("users", model("users", vec![]));
        let schema = resolve(&models).unwrap();
        let order: Vec<&str> = schema.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["users", "posts"]);
    }

    #[test]
    fn detects_cycle() {
        let a_to_b = Relation::new(RelationKind::HasOne, "b", "b_id", None, None).unwrap();
        let b_to_a = Relation::new(RelationKind::HasOne, "a", "a_id", None, None).unwrap();
        let mut models = OrderedMap::new();
        models.insert("a", model("a", vec![("b", a_to_b)]));
        models.insert("b", model("b", vec![("a", b_to_a)]));
        let err = resolve(&models).unwrap_err();
        match err {
            Error::CyclicSchema(path) => assert_eq!(path.len(), 3),
            other => panic!("expected CyclicSchema, got {other:?}"),
        }
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let self_rel = Relation::new(RelationKind::HasOne, "category", "parent_id", None, None).unwrap();
        let mut models = OrderedMap::new();
        models.insert("category", model("category", vec![("parent", self_rel)]));
        assert!(resolve(&models).is_ok());
    }

    #[test]
    fn stable_across_repeated_calls() {
        let posts_to_users =
            Relation::new(RelationKind::HasOne, "users", "user_id", None, None).unwrap();
        let mut models = OrderedMap::new();
        models.insert("posts", model("posts", vec![("author", posts_to_users)]));
        models.insert("users", model("users", vec![]));
        models.insert("comments", model("comments", vec![]));

        let first: Vec<String> = resolve(&models).unwrap().iter().map(|(k, _)| k.to_string()).collect();
        let second: Vec<String> = resolve(&models).unwrap().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(first, second);
    }
}
