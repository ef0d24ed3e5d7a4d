//! Raw model definitions as they appear in the models JSON file.

use serde::{Deserialize, Deserializer, Serialize};

/// Declared field type. Drives query-string coercion, body shape checks and SQL casts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[serde(alias = "int", alias = "serial")]
    Integer,
    #[serde(alias = "bigserial")]
    BigInt,
    #[serde(alias = "double", alias = "real")]
    Float,
    #[serde(alias = "string", alias = "varchar")]
    Text,
    #[serde(alias = "bool")]
    Boolean,
    Uuid,
    Timestamptz,
    Timestamp,
    Date,
    #[serde(alias = "jsonb")]
    Json,
}

impl FieldType {
    /// PostgreSQL type name used for `$n::type` casts when binding values.
    pub fn pg_type(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::BigInt => "bigint",
            FieldType::Float => "double precision",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Uuid => "uuid",
            FieldType::Timestamptz => "timestamptz",
            FieldType::Timestamp => "timestamp",
            FieldType::Date => "date",
            FieldType::Json => "jsonb",
        }
    }
}

/// Column default: a literal JSON value, or a database-side expression (e.g. `now()`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum FieldDefault {
    Literal(serde_json::Value),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for FieldDefault {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(FieldDefault::Expression { expression: s });
                }
                if let Some(lit) = obj.remove("value") {
                    return Ok(FieldDefault::Literal(lit));
                }
                Err(serde::de::Error::custom(format!(
                    "field default must be a literal, {{ \"expression\": \"...\" }}, or {{ \"value\": ... }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Ok(FieldDefault::Literal(other)),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<FieldDefault>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

fn default_true() -> bool {
    true
}

fn default_primary_key() -> String {
    "id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name, used in logs.
    pub name: String,
    /// Table name; also the URL segment for the model's routes.
    pub table: String,
    /// Database schema. `None` uses the connection's search path.
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub fields: Vec<FieldConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_defaults() {
        let m: ModelConfig = serde_json::from_value(json!({
            "name": "Post",
            "table": "posts",
            "fields": [
                {"name": "id", "type": "serial", "nullable": false},
                {"name": "title", "type": "string", "nullable": false},
                {"name": "views", "type": "integer", "default": 0},
                {"name": "created_at", "type": "timestamptz", "default": {"expression": "now()"}}
            ]
        }))
        .unwrap();
        assert_eq!(m.primary_key, "id");
        assert!(m.schema.is_none());
        assert_eq!(m.fields[0].type_, FieldType::Integer);
        assert_eq!(m.fields[1].type_, FieldType::Text);
        assert!(m.fields[2].nullable);
        assert_eq!(m.fields[2].default, Some(FieldDefault::Literal(json!(0))));
        assert_eq!(
            m.fields[3].default,
            Some(FieldDefault::Expression { expression: "now()".into() })
        );
    }

    #[test]
    fn unknown_type_rejected() {
        let r: Result<FieldConfig, _> = serde_json::from_value(json!({"name": "x", "type": "geometry"}));
        assert!(r.is_err());
    }
}
