// src/model/field.rs

//! Field model (part of C2): a column definition and its invariants.

use crate::error::{Error, Result};
use serde_json::{json, Value};

/// The logical type of a column, independent of dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Integer,
    Decimal { precision: u32, scale: u32 },
    Float,
    Varchar { max_length: Option<u32> },
    Text,
    Enum { choices: Vec<String> },
    Date,
    DateTime,
    Blob,
    Boolean,
    Uuid,
    Json,
    Xml,
}

impl FieldKind {
    /// Reconstruct a `FieldKind` from `FieldKind::canonical_view`'s output
    /// (used to load `schema_snapshot.json` back into an old `Schema` for
    /// diffing, not just for checksumming).
    fn from_canonical_view(value: &Value) -> Result<Self> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidSchema("field kind missing 'type'".to_string()))?;
        match tag {
            "integer" => Ok(FieldKind::Integer),
            "decimal" => {
                let precision = value.get("precision").and_then(Value::as_u64).unwrap_or(0) as u32;
                let scale = value.get("scale").and_then(Value::as_u64).unwrap_or(0) as u32;
                Ok(FieldKind::Decimal { precision, scale })
            }
            "float" => Ok(FieldKind::Float),
            "varchar" => {
                let max_length = value.get("maxLength").and_then(Value::as_u64).map(|n| n as u32);
                Ok(FieldKind::Varchar { max_length })
            }
            "text" => Ok(FieldKind::Text),
            "enum" => {
                let choices = value
                    .get("choices")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::InvalidSchema("enum field kind missing 'choices'".to_string()))?
                    .iter()
                    .map(|c| c.as_str().unwrap_or_default().to_string())
                    .collect();
                Ok(FieldKind::Enum { choices })
            }
            "date" => Ok(FieldKind::Date),
            "datetime" => Ok(FieldKind::DateTime),
            "blob" => Ok(FieldKind::Blob),
            "boolean" => Ok(FieldKind::Boolean),
            "uuid" => Ok(FieldKind::Uuid),
            "json" => Ok(FieldKind::Json),
            "xml" => Ok(FieldKind::Xml),
            other => Err(Error::InvalidSchema(format!("unrecognized field kind '{other}'"))),
        }
    }

    /// The type tag used in the canonical view and in diff comparisons.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Decimal { .. } => "decimal",
            FieldKind::Float => "float",
            FieldKind::Varchar { .. } => "varchar",
            FieldKind::Text => "text",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Blob => "blob",
            FieldKind::Boolean => "boolean",
            FieldKind::Uuid => "uuid",
            FieldKind::Json => "json",
            FieldKind::Xml => "xml",
        }
    }

    fn canonical_view(&self) -> Value {
        match self {
            FieldKind::Decimal { precision, scale } => json!({
                "type": self.tag(), "precision": precision, "scale": scale,
            }),
            FieldKind::Varchar { max_length } => json!({
                "type": self.tag(), "maxLength": max_length,
            }),
            FieldKind::Enum { choices } => json!({
                "type": self.tag(), "choices": choices,
            }),
            _ => json!({ "type": self.tag() }),
        }
    }
}

/// A column default: either a literal value or a recognized SQL function
/// token (`CURRENT_TIMESTAMP`, `gen_random_uuid()`, ...) emitted unquoted.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    SqlFunction(String),
}

impl DefaultValue {
    fn from_canonical_view(value: &Value) -> Result<Self> {
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
        let inner = value.get("value").cloned().unwrap_or(Value::Null);
        match kind {
            "function" => {
                let token = inner.as_str().unwrap_or_default().to_string();
                Ok(DefaultValue::SqlFunction(token))
            }
            _ => match inner {
                Value::Null => Ok(DefaultValue::Null),
                Value::Bool(b) => Ok(DefaultValue::Bool(b)),
                Value::String(s) => Ok(DefaultValue::String(s)),
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Ok(DefaultValue::Int(i))
                    } else {
                        Ok(DefaultValue::Float(n.as_f64().unwrap_or(0.0)))
                    }
                }
                other => Err(Error::InvalidSchema(format!("unrecognized default literal {other}"))),
            },
        }
    }

    fn canonical_view(&self) -> Value {
        match self {
            DefaultValue::String(s) => json!({"kind": "literal", "value": s}),
            DefaultValue::Int(i) => json!({"kind": "literal", "value": i}),
            DefaultValue::Float(f) => json!({"kind": "literal", "value": f}),
            DefaultValue::Bool(b) => json!({"kind": "literal", "value": b}),
            DefaultValue::Null => json!({"kind": "literal", "value": null}),
            DefaultValue::SqlFunction(f) => json!({"kind": "function", "value": f}),
        }
    }
}

/// Options accepted by [`Field::new`]. Mirrors the `{type, ...opts}`
/// constructor-option pair spec.md describes for host-language model
/// authoring, expressed as an explicit option struct rather than an object
/// spread (spec.md §9 design note).
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub unique: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub comment: Option<String>,
    pub help_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub unique: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub comment: Option<String>,
    pub help_text: Option<String>,
}

impl Field {
    /// Validate and freeze a field. Enum choices must be non-empty and
    /// distinct; an enum default must appear in choices; auto-increment
    /// implies integer type and a single-column primary key (the
    /// single-column half of that invariant is enforced where the primary
    /// key set is known — at the model level, see `model::Model::new`).
    pub fn new(name: impl Into<String>, kind: FieldKind, opts: FieldOptions) -> Result<Self> {
        let name = name.into();

        if let FieldKind::Enum { choices } = &kind {
            if choices.is_empty() {
                return Err(Error::InvalidField(format!(
                    "field '{name}': enum choices must be non-empty"
                )));
            }
            let mut seen = std::collections::HashSet::new();
            for choice in choices {
                if !seen.insert(choice.as_str()) {
                    return Err(Error::InvalidField(format!(
                        "field '{name}': enum choices must be distinct, duplicate '{choice}'"
                    )));
                }
            }
            if let Some(DefaultValue::String(default)) = &opts.default {
                if !choices.contains(default) {
                    return Err(Error::InvalidField(format!(
                        "field '{name}': default '{default}' is not among enum choices"
                    )));
                }
            }
        }

        if opts.auto_increment && !matches!(kind, FieldKind::Integer) {
            return Err(Error::InvalidField(format!(
                "field '{name}': auto_increment requires integer type"
            )));
        }

        Ok(Self {
            name,
            kind,
            nullable: opts.nullable,
            default: opts.default,
            unique: opts.unique,
            primary_key: opts.primary_key,
            auto_increment: opts.auto_increment,
            comment: opts.comment,
            help_text: opts.help_text,
        })
    }

    /// Reconstruct a field from its [`Field::canonical_view`] output (the
    /// on-disk snapshot's per-field entry). `helpText` is never recovered
    /// since `canonical_view` never emits it.
    pub fn from_canonical_view(name: &str, value: &Value) -> Result<Self> {
        let kind = FieldKind::from_canonical_view(
            value
                .get("kind")
                .ok_or_else(|| Error::InvalidSchema(format!("field '{name}' missing 'kind'")))?,
        )?;
        let default = match value.get("default") {
            None | Some(Value::Null) => None,
            Some(v) => Some(DefaultValue::from_canonical_view(v)?),
        };
        let opts = FieldOptions {
            nullable: value.get("nullable").and_then(Value::as_bool).unwrap_or(false),
            default,
            unique: value.get("unique").and_then(Value::as_bool).unwrap_or(false),
            primary_key: value.get("primaryKey").and_then(Value::as_bool).unwrap_or(false),
            auto_increment: value.get("autoIncrement").and_then(Value::as_bool).unwrap_or(false),
            comment: value.get("comment").and_then(Value::as_str).map(String::from),
            help_text: None,
        };
        Field::new(name, kind, opts)
    }

    /// Canonical JSON view for snapshotting/checksumming. Help text is
    /// never emitted, per spec.md §3.
    pub fn canonical_view(&self) -> Value {
        json!({
            "kind": self.kind.canonical_view(),
            "nullable": self.nullable,
            "default": self.default.as_ref().map(DefaultValue::canonical_view),
            "unique": self.unique,
            "primaryKey": self.primary_key,
            "autoIncrement": self.auto_increment,
            "comment": self.comment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_enum() {
        let err = Field::new(
            "level",
            FieldKind::Enum { choices: vec![] },
            FieldOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));
    }

    #[test]
    fn rejects_default_outside_choices() {
        let err = Field::new(
            "level",
            FieldKind::Enum {
                choices: vec!["A".into(), "B".into()],
            },
            FieldOptions {
                default: Some(DefaultValue::String("C".into())),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));
    }

    #[test]
    fn rejects_auto_increment_on_non_integer() {
        let err = Field::new(
            "id",
            FieldKind::Text,
            FieldOptions {
                auto_increment: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));
    }

    #[test]
    fn help_text_excluded_from_canonical_view() {
        let field = Field::new(
            "email",
            FieldKind::Varchar { max_length: Some(255) },
            FieldOptions {
                help_text: Some("shown in docs only".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let view = field.canonical_view();
        assert!(view.get("helpText").is_none());
        assert!(serde_json::to_string(&view).unwrap().contains("varchar"));
    }
}
