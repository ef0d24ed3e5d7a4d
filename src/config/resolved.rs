//! Resolved model: definitions validated and flattened for runtime use.

use crate::config::{FieldDefault, FieldType, ValidationRule};
use crate::error::AppError;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub is_pk: bool,
    pub default: Option<FieldDefault>,
    pub validation: Option<ValidationRule>,
}

impl Field {
    /// A value must be supplied in every write body: not nullable, not the primary key, no default.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.is_pk && self.default.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub primary_key: String,
    pub pk_type: FieldType,
    pub fields: Vec<Field>,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Parse a path id into the primary key's JSON representation.
    pub fn parse_id(&self, id_str: &str) -> Result<Value, AppError> {
        let id_str = id_str.trim();
        Ok(match self.pk_type {
            FieldType::Uuid => {
                let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::bad_request("invalid uuid"))?;
                Value::String(u.to_string())
            }
            FieldType::Integer | FieldType::BigInt => {
                let n: i64 = id_str.parse().map_err(|_| AppError::bad_request("invalid id"))?;
                Value::Number(n.into())
            }
            _ => Value::String(id_str.to_string()),
        })
    }

    /// Parse a comma-separated id list. Empty segments are skipped.
    pub fn parse_ids(&self, ids_str: &str) -> Result<Vec<Value>, AppError> {
        ids_str
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| self.parse_id(s))
            .collect()
    }

    /// Coerce a query-string value to the field's type. Falls back to the raw string when it does not parse.
    pub fn coerce_query_value(&self, field: &str, s: &str) -> Value {
        let Some(f) = self.field(field) else {
            return Value::String(s.to_string());
        };
        match f.field_type {
            FieldType::Integer | FieldType::BigInt => {
                if let Ok(n) = s.parse::<i64>() {
                    return Value::Number(n.into());
                }
            }
            FieldType::Float => {
                if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                    return Value::Number(n);
                }
            }
            FieldType::Boolean => {
                if s.eq_ignore_ascii_case("true") || s == "1" {
                    return Value::Bool(true);
                }
                if s.eq_ignore_ascii_case("false") || s == "0" {
                    return Value::Bool(false);
                }
            }
            FieldType::Uuid => {
                if let Ok(u) = uuid::Uuid::parse_str(s) {
                    return Value::String(u.to_string());
                }
            }
            _ => {}
        }
        Value::String(s.to_string())
    }
}
