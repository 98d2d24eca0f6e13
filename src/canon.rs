// src/canon.rs

//! Canonicalizer & Checksum (C1).
//!
//! Canonicalize any JSON-like value recursively — scalars pass through,
//! arrays preserve order, objects are rewritten with lexicographically
//! sorted keys — then checksum the compact serialization with SHA-256.
//!
//! `serde_json::Value`'s default `Map` (the `preserve_order` feature is not
//! enabled here) is `BTreeMap`-backed, so sorting falls out of
//! `serde_json::to_string` for free once every nested object has been walked
//! through [`canonicalize`]; we still do the walk explicitly so a caller can
//! inspect the canonical form before serializing it.

use crate::error::{Error, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively canonicalize a JSON-like value. Object keys end up sorted
/// because `serde_json::Map` is a `BTreeMap` under the default feature set;
/// arrays and scalars pass through unchanged (arrays are ordered sequences
/// per spec, never treated as sets).
pub fn canonicalize(value: &Value) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), canonicalize(v)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(canonicalize(item)?);
            }
            Ok(Value::Array(out))
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(Error::InvalidSchema(
                        "non-finite number cannot be canonicalized".to_string(),
                    ));
                }
            }
            Ok(Value::Number(n.clone()))
        }
        other => Ok(other.clone()),
    }
}

/// Serialize an already-canonical value as compact JSON (no insignificant
/// whitespace — `serde_json::to_string` never inserts any).
pub fn serialize_canonical(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Lowercase hex SHA-256 of the compact canonical serialization of `value`.
pub fn checksum(value: &Value) -> Result<String> {
    let canon = canonicalize(value)?;
    let serialized = serialize_canonical(&canon)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        let canon = canonicalize(&v).unwrap();
        assert_eq!(serialize_canonical(&canon).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let v = json!({"xs": [3, 1, 2]});
        let canon = canonicalize(&v).unwrap();
        assert_eq!(serialize_canonical(&canon).unwrap(), r#"{"xs":[3,1,2]}"#);
    }

    #[test]
    fn checksum_is_stable_across_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(checksum(&a).unwrap(), checksum(&b).unwrap());
    }

    #[test]
    fn checksum_round_trips_through_serialization() {
        let v = json!({"nested": {"z": [1,2,3], "a": "x"}});
        let canon = canonicalize(&v).unwrap();
        let serialized = serialize_canonical(&canon).unwrap();
        let reparsed: Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(checksum(&v).unwrap(), checksum(&reparsed).unwrap());
    }

    #[test]
    fn finite_floats_pass_through() {
        // serde_json already maps NaN/Infinity to Null at construction time,
        // so the non-finite guard in `canonicalize` is a defensive backstop
        // rather than something reachable through `serde_json::json!`.
        let finite = json!([1.5, 2.25]);
        assert!(canonicalize(&finite).is_ok());
    }
}
