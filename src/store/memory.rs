//! In-process session for tests and prototyping. Tables are created on first use.

use crate::config::{FieldDefault, FieldType, Model};
use crate::error::AppError;
use crate::store::{value_eq, ListQuery, Row, Session};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    fn from_value(v: &Value) -> Option<Key> {
        match v {
            Value::Number(n) => n.as_i64().map(Key::Int),
            Value::String(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<Key, Row>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemorySession {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, Table>) -> T) -> Result<T, AppError> {
        let guard = self
            .tables
            .read()
            .map_err(|_| AppError::Internal("memory session lock poisoned".into()))?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, Table>) -> Result<T, AppError>) -> Result<T, AppError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| AppError::Internal("memory session lock poisoned".into()))?;
        f(&mut guard)
    }
}

fn matches_all(row: &Row, fields: &Row) -> bool {
    fields
        .iter()
        .all(|(k, v)| value_eq(row.get(k).unwrap_or(&Value::Null), v))
}

fn matches_any(row: &Row, field: &str, values: &[Value]) -> bool {
    let cell = row.get(field).unwrap_or(&Value::Null);
    values.iter().any(|v| value_eq(cell, v))
}

fn evaluate_default(default: &FieldDefault) -> Value {
    match default {
        FieldDefault::Literal(v) => v.clone(),
        FieldDefault::Expression { expression } => match expression.trim().to_lowercase().as_str() {
            "now()" | "current_timestamp" => Value::String(chrono::Utc::now().to_rfc3339()),
            "current_date" => Value::String(chrono::Utc::now().format("%Y-%m-%d").to_string()),
            "gen_random_uuid()" => Value::String(uuid::Uuid::new_v4().to_string()),
            _ => Value::Null,
        },
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn fetch(&self, model: &Model, id: &Value) -> Result<Option<Row>, AppError> {
        let Some(key) = Key::from_value(id) else {
            return Ok(None);
        };
        self.read(|tables| tables.get(&model.table).and_then(|t| t.rows.get(&key)).cloned())
    }

    async fn list(&self, model: &Model, query: &ListQuery) -> Result<Vec<Row>, AppError> {
        self.read(|tables| {
            let Some(table) = tables.get(&model.table) else {
                return Vec::new();
            };
            let matching = table.rows.values().filter(|row| {
                query
                    .filters
                    .iter()
                    .filter(|(col, _)| model.has_field(col))
                    .all(|(col, values)| matches_any(row, col, values))
                    && query
                        .ids
                        .as_ref()
                        .map(|ids| matches_any(row, &model.primary_key, ids))
                        .unwrap_or(true)
            });
            match query.page {
                Some(p) => matching
                    .skip(p.offset() as usize)
                    .take(p.size as usize)
                    .cloned()
                    .collect(),
                None => matching.cloned().collect(),
            }
        })
    }

    async fn find_matching(&self, model: &Model, fields: &Row) -> Result<Option<Row>, AppError> {
        self.read(|tables| {
            tables
                .get(&model.table)
                .and_then(|t| t.rows.values().find(|row| matches_all(row, fields)))
                .cloned()
        })
    }

    async fn insert(&self, model: &Model, row: &Row) -> Result<Row, AppError> {
        self.write(|tables| {
            let table = tables.entry(model.table.clone()).or_default();
            let mut stored = Row::new();
            for f in &model.fields {
                let v = match row.get(&f.name) {
                    Some(v) => v.clone(),
                    None => f.default.as_ref().map(evaluate_default).unwrap_or(Value::Null),
                };
                stored.insert(f.name.clone(), v);
            }

            let pk = model.primary_key.as_str();
            if stored.get(pk).map(Value::is_null).unwrap_or(true) {
                let generated = match model.pk_type {
                    FieldType::Integer | FieldType::BigInt => {
                        table.next_id += 1;
                        Value::Number(table.next_id.into())
                    }
                    FieldType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
                    _ => return Err(AppError::bad_request(format!("Missing field [{}]", pk))),
                };
                stored.insert(pk.to_string(), generated);
            }
            let key = stored
                .get(pk)
                .and_then(Key::from_value)
                .ok_or_else(|| AppError::bad_request(format!("invalid value for [{}]", pk)))?;
            if table.rows.contains_key(&key) {
                return Err(AppError::conflict("resource already exists"));
            }
            if let Key::Int(n) = key {
                table.next_id = table.next_id.max(n);
            }
            table.rows.insert(key, stored.clone());
            tracing::debug!(table = %model.table, "memory insert");
            Ok(stored)
        })
    }

    async fn update(&self, model: &Model, id: &Value, changes: &Row) -> Result<Option<Row>, AppError> {
        let Some(key) = Key::from_value(id) else {
            return Ok(None);
        };
        self.write(|tables| {
            let Some(row) = tables.get_mut(&model.table).and_then(|t| t.rows.get_mut(&key)) else {
                return Ok(None);
            };
            for f in &model.fields {
                if f.is_pk {
                    continue;
                }
                if let Some(v) = changes.get(&f.name) {
                    row.insert(f.name.clone(), v.clone());
                }
            }
            tracing::debug!(table = %model.table, "memory update");
            Ok(Some(row.clone()))
        })
    }

    async fn delete(&self, model: &Model, id: &Value) -> Result<Option<Row>, AppError> {
        let Some(key) = Key::from_value(id) else {
            return Ok(None);
        };
        self.write(|tables| Ok(tables.get_mut(&model.table).and_then(|t| t.rows.remove(&key))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, ModelConfig};
    use crate::store::Page;
    use serde_json::json;

    fn model() -> Model {
        let cfg: ModelConfig = serde_json::from_value(json!({
            "name": "Note",
            "table": "notes",
            "fields": [
                {"name": "id", "type": "integer", "nullable": false},
                {"name": "body", "type": "text"},
                {"name": "pinned", "type": "boolean", "default": false}
            ]
        }))
        .unwrap();
        resolve(&[cfg]).unwrap().remove(0)
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_defaults() {
        let s = MemorySession::new();
        let m = model();
        let a = s.insert(&m, &row(json!({"body": "a"}))).await.unwrap();
        let b = s.insert(&m, &row(json!({"id": 10, "body": "b"}))).await.unwrap();
        let c = s.insert(&m, &row(json!({"body": "c"}))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(a["pinned"], json!(false));
        assert_eq!(b["id"], json!(10));
        assert_eq!(c["id"], json!(11));
    }

    #[tokio::test]
    async fn duplicate_key_conflicts() {
        let s = MemorySession::new();
        let m = model();
        s.insert(&m, &row(json!({"id": 1}))).await.unwrap();
        let err = s.insert(&m, &row(json!({"id": 1}))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn list_filters_and_pages() {
        let s = MemorySession::new();
        let m = model();
        for i in 0..5 {
            s.insert(&m, &row(json!({"body": format!("n{}", i % 2)}))).await.unwrap();
        }
        let q = ListQuery {
            filters: vec![("body".into(), vec![json!("n0")])],
            ..Default::default()
        };
        assert_eq!(s.list(&m, &q).await.unwrap().len(), 3);

        let q = ListQuery {
            page: Some(Page { number: 2, size: 2 }),
            ..Default::default()
        };
        let page: Vec<Value> = s.list(&m, &q).await.unwrap().into_iter().map(|r| r["id"].clone()).collect();
        assert_eq!(page, vec![json!(3), json!(4)]);

        let q = ListQuery {
            ids: Some(vec![json!(1), json!(5)]),
            ..Default::default()
        };
        assert_eq!(s.list(&m, &q).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_and_delete_missing_are_none() {
        let s = MemorySession::new();
        let m = model();
        assert!(s.update(&m, &json!(4), &Row::new()).await.unwrap().is_none());
        assert!(s.delete(&m, &json!(4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_keeps_primary_key() {
        let s = MemorySession::new();
        let m = model();
        s.insert(&m, &row(json!({"body": "x"}))).await.unwrap();
        let updated = s
            .update(&m, &json!(1), &row(json!({"id": 99, "body": "y"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["id"], json!(1));
        assert_eq!(updated["body"], json!("y"));
    }
}
