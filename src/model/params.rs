// src/model/params.rs

//! `assertParams` — the capability interface spec.md §9 asks for in place
//! of dynamically bound model methods: a free function taking a value and a
//! list of rules, rather than a method resolved through runtime `this`.
//! Host-authored model methods are expected to call this directly, passing
//! the model in as an explicit parameter (never through implicit binding).

use crate::error::{Error, Result};
use serde_json::Value;

/// What kind of JSON value a parameter rule expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Bool,
    Object,
    Array,
}

/// A single validation rule for one named parameter.
#[derive(Debug, Clone, Default)]
pub struct ParamRule {
    pub name: String,
    pub required: bool,
    pub param_type: Option<ParamType>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub one_of: Option<Vec<String>>,
}

impl ParamRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn of_type(mut self, t: ParamType) -> Self {
        self.param_type = Some(t);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn one_of(mut self, choices: Vec<String>) -> Self {
        self.one_of = Some(choices);
        self
    }
}

/// Validate `params` (a JSON object) against `rules`, raising `InvalidField`
/// on the first violation.
pub fn assert_params(params: &Value, rules: &[ParamRule]) -> Result<()> {
    let obj = params
        .as_object()
        .ok_or_else(|| Error::InvalidField("params must be a JSON object".to_string()))?;

    for rule in rules {
        let value = obj.get(&rule.name);
        match value {
            None => {
                if rule.required {
                    return Err(Error::InvalidField(format!(
                        "missing required param '{}'",
                        rule.name
                    )));
                }
                continue;
            }
            Some(value) => {
                if let Some(expected) = rule.param_type {
                    let matches = match expected {
                        ParamType::String => value.is_string(),
                        ParamType::Number => value.is_number(),
                        ParamType::Bool => value.is_boolean(),
                        ParamType::Object => value.is_object(),
                        ParamType::Array => value.is_array(),
                    };
                    if !matches {
                        return Err(Error::InvalidField(format!(
                            "param '{}' has the wrong type",
                            rule.name
                        )));
                    }
                }
                if let Some(n) = value.as_f64() {
                    if let Some(min) = rule.min {
                        if n < min {
                            return Err(Error::InvalidField(format!(
                                "param '{}' is below minimum {}",
                                rule.name, min
                            )));
                        }
                    }
                    if let Some(max) = rule.max {
                        if n > max {
                            return Err(Error::InvalidField(format!(
                                "param '{}' is above maximum {}",
                                rule.name, max
                            )));
                        }
                    }
                }
                if let (Some(choices), Some(s)) = (&rule.one_of, value.as_str()) {
                    if !choices.iter().any(|c| c == s) {
                        return Err(Error::InvalidField(format!(
                            "param '{}' must be one of {:?}",
                            rule.name, choices
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_param_missing_fails() {
        let rules = vec![ParamRule::new("email").required()];
        let err = assert_params(&json!({}), &rules).unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));
    }

    #[test]
    fn range_check_enforced() {
        let rules = vec![ParamRule::new("age").of_type(ParamType::Number).range(0.0, 120.0)];
        assert!(assert_params(&json!({"age": 200}), &rules).is_err());
        assert!(assert_params(&json!({"age": 30}), &rules).is_ok());
    }

    #[test]
    fn one_of_enforced() {
        let rules = vec![ParamRule::new("level").one_of(vec!["A".into(), "B".into()])];
        assert!(assert_params(&json!({"level": "C"}), &rules).is_err());
        assert!(assert_params(&json!({"level": "A"}), &rules).is_ok());
    }
}
