// src/model/index.rs

//! Index model (part of C2).

use crate::error::{Error, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub fields: Vec<String>,
    pub unique: bool,
    pub name: Option<String>,
}

impl Index {
    pub fn new(fields: Vec<String>, unique: bool, name: Option<String>) -> Self {
        Self { fields, unique, name }
    }

    /// The name used on the wire: the user's explicit name, or
    /// `idx_<table>_<fields-joined-by-underscore>`.
    pub fn effective_name(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("idx_{table}_{}", self.fields.join("_")))
    }

    /// Identity key used to match indexes across schema versions
    /// independent of name: `<sorted fields>|<unique?>` (spec.md §4.1).
    pub fn match_key(&self) -> String {
        let mut fields = self.fields.clone();
        fields.sort();
        format!("{}|{}", fields.join(","), self.unique)
    }

    /// Reconstruct an index from its [`Index::canonical_view`] output. The
    /// name always round-trips as explicit (the view stores the
    /// already-resolved `effective_name`); `Schema::prechecksum_checksums`
    /// strips a now-redundant explicit name back out before checksumming,
    /// so this doesn't introduce spurious diffs.
    pub fn from_canonical_view(value: &Value) -> Result<Self> {
        let fields = value
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidSchema("index missing 'fields'".to_string()))?
            .iter()
            .map(|f| f.as_str().unwrap_or_default().to_string())
            .collect();
        let unique = value.get("unique").and_then(Value::as_bool).unwrap_or(false);
        let name = value.get("name").and_then(Value::as_str).map(String::from);
        Ok(Index::new(fields, unique, name))
    }

    pub fn canonical_view(&self, table: &str) -> Value {
        json!({
            "fields": self.fields,
            "unique": self.unique,
            "name": self.effective_name(table),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_generates_name() {
        let idx = Index::new(vec!["email".into()], true, None);
        assert_eq!(idx.effective_name("users"), "idx_users_email");
    }

    #[test]
    fn match_key_ignores_field_order() {
        let a = Index::new(vec!["a".into(), "b".into()], false, None);
        let b = Index::new(vec!["b".into(), "a".into()], false, None);
        assert_eq!(a.match_key(), b.match_key());
    }

    #[test]
    fn match_key_distinguishes_uniqueness() {
        let a = Index::new(vec!["a".into()], false, None);
        let b = Index::new(vec!["a".into()], true, None);
        assert_ne!(a.match_key(), b.match_key());
    }
}
