//! Serialization capability for a model: row to plain JSON and partial updates in place.

use crate::config::Model;
use crate::store::Row;
use serde_json::Value;
use std::sync::Arc;

/// A model paired with `to_dict`/`from_dict`. Built once per model at registration.
#[derive(Clone, Debug)]
pub struct SerializableModel {
    model: Arc<Model>,
}

impl SerializableModel {
    pub fn new(model: Model) -> Self {
        SerializableModel { model: Arc::new(model) }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Declared fields of `row` as a JSON object. Missing fields are null.
    pub fn to_dict(&self, row: &Row) -> Value {
        let mut out = serde_json::Map::new();
        for f in &self.model.fields {
            out.insert(f.name.clone(), row.get(&f.name).cloned().unwrap_or(Value::Null));
        }
        Value::Object(out)
    }

    /// Apply declared, non-key fields from `data` onto `row`.
    pub fn from_dict(&self, row: &mut Row, data: &Row) {
        for f in &self.model.fields {
            if f.is_pk {
                continue;
            }
            if let Some(v) = data.get(&f.name) {
                row.insert(f.name.clone(), v.clone());
            }
        }
    }

    /// New row from field assignments. Undeclared keys are dropped.
    pub fn instantiate(&self, data: &Row) -> Row {
        let mut row = Row::new();
        for f in &self.model.fields {
            if let Some(v) = data.get(&f.name) {
                row.insert(f.name.clone(), v.clone());
            }
        }
        row
    }
}
