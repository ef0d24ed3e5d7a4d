//! Model definition validation: primary keys, field names, table uniqueness.

use crate::config::{FieldType, ModelConfig};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;

const IDENTIFIER: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

pub(crate) fn identifier() -> Result<Regex, ConfigError> {
    Regex::new(IDENTIFIER).map_err(|e| ConfigError::Validation(e.to_string()))
}

pub fn validate(models: &[ModelConfig]) -> Result<(), ConfigError> {
    let ident = identifier()?;
    let mut tables = HashSet::new();
    for m in models {
        if !ident.is_match(&m.table) {
            return Err(ConfigError::Validation(format!("model {}: invalid table name '{}'", m.name, m.table)));
        }
        if let Some(schema) = &m.schema {
            if !ident.is_match(schema) {
                return Err(ConfigError::Validation(format!("model {}: invalid schema name '{}'", m.name, schema)));
            }
        }
        if !tables.insert(m.table.as_str()) {
            return Err(ConfigError::DuplicateTable(m.table.clone()));
        }
        if m.fields.is_empty() {
            return Err(ConfigError::Validation(format!("model {}: at least one field required", m.name)));
        }

        let mut names = HashSet::new();
        for f in &m.fields {
            if !ident.is_match(&f.name) {
                return Err(ConfigError::Validation(format!("model {}: invalid field name '{}'", m.name, f.name)));
            }
            if !names.insert(f.name.as_str()) {
                return Err(ConfigError::Validation(format!("model {}: duplicate field '{}'", m.name, f.name)));
            }
        }

        let pk = m
            .fields
            .iter()
            .find(|f| f.name == m.primary_key)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                model: m.name.clone(),
                field: m.primary_key.clone(),
            })?;
        if !matches!(
            pk.type_,
            FieldType::Integer | FieldType::BigInt | FieldType::Text | FieldType::Uuid
        ) {
            return Err(ConfigError::InvalidPrimaryKey {
                model: m.name.clone(),
                field: m.primary_key.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(table: &str, pk: &str) -> ModelConfig {
        serde_json::from_value(json!({
            "name": "M",
            "table": table,
            "primary_key": pk,
            "fields": [
                {"name": "id", "type": "integer"},
                {"name": "score", "type": "float"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn accepts_valid() {
        assert!(validate(&[model("a", "id"), model("b", "id")]).is_ok());
    }

    #[test]
    fn rejects_duplicate_table() {
        let err = validate(&[model("a", "id"), model("a", "id")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTable(t) if t == "a"));
    }

    #[test]
    fn rejects_bad_primary_key() {
        assert!(matches!(
            validate(&[model("a", "missing")]).unwrap_err(),
            ConfigError::InvalidPrimaryKey { .. }
        ));
        assert!(matches!(
            validate(&[model("a", "score")]).unwrap_err(),
            ConfigError::InvalidPrimaryKey { .. }
        ));
    }

    #[test]
    fn rejects_non_identifier_names() {
        for table in ["", "*all", "items:id", "a/b", "1st", "has space"] {
            let err = validate(&[model(table, "id")]).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "table {:?}", table);
        }

        let mut bad_schema = model("a", "id");
        bad_schema.schema = Some("public;drop".into());
        assert!(matches!(validate(&[bad_schema]).unwrap_err(), ConfigError::Validation(_)));

        let mut bad_field = model("a", "id");
        bad_field.fields[1].name = "score\"".into();
        assert!(matches!(validate(&[bad_field]).unwrap_err(), ConfigError::Validation(_)));
    }
}
