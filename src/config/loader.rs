//! Load model definitions from JSON and resolve them for runtime use.

use crate::config::resolved::{Field, Model};
use crate::config::{validate, ModelConfig};
use crate::error::ConfigError;
use std::path::Path;

/// Build resolved models from definitions (validates first). Order is preserved.
pub fn resolve(models: &[ModelConfig]) -> Result<Vec<Model>, ConfigError> {
    validate(models)?;
    let mut out = Vec::with_capacity(models.len());
    for m in models {
        let fields: Vec<Field> = m
            .fields
            .iter()
            .map(|f| Field {
                name: f.name.clone(),
                field_type: f.type_,
                nullable: f.nullable,
                is_pk: f.name == m.primary_key,
                default: f.default.clone(),
                validation: f.validation.clone(),
            })
            .collect();
        let pk_type = fields
            .iter()
            .find(|f| f.is_pk)
            .map(|f| f.field_type)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                model: m.name.clone(),
                field: m.primary_key.clone(),
            })?;
        out.push(Model {
            name: m.name.clone(),
            table: m.table.clone(),
            schema: m.schema.clone(),
            primary_key: m.primary_key.clone(),
            pk_type,
            fields,
        });
    }
    Ok(out)
}

/// Parse a JSON array of model definitions.
pub fn models_from_str(s: &str) -> Result<Vec<ModelConfig>, ConfigError> {
    serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read a JSON array of model definitions from a file.
pub async fn load_models_from_path(path: impl AsRef<Path>) -> Result<Vec<ModelConfig>, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading models");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    models_from_str(&raw)
}
