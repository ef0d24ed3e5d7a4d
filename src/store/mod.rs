//! Data-access sessions. A resource handler forwards every CRUD call to a `Session`;
//! each mutating call is exactly one commit.

mod memory;
mod postgres;

pub use memory::MemorySession;
pub use postgres::PgSession;

use crate::config::Model;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// One record as a JSON object keyed by field name.
pub type Row = serde_json::Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn offset(&self) -> u64 {
        u64::from(self.number.saturating_sub(1)) * u64::from(self.size)
    }
}

/// List request: `field IN (values)` per filter, optional primary-key set, optional page.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub filters: Vec<(String, Vec<Value>)>,
    pub ids: Option<Vec<Value>>,
    pub page: Option<Page>,
}

#[async_trait]
pub trait Session: Send + Sync {
    /// Fetch one row by primary key.
    async fn fetch(&self, model: &Model, id: &Value) -> Result<Option<Row>, AppError>;

    /// Rows matching the query, ordered by primary key.
    async fn list(&self, model: &Model, query: &ListQuery) -> Result<Vec<Row>, AppError>;

    /// First row whose fields equal every entry of `fields`.
    async fn find_matching(&self, model: &Model, fields: &Row) -> Result<Option<Row>, AppError>;

    /// Add a new row and commit. Returns the stored row (with generated key and defaults).
    async fn insert(&self, model: &Model, row: &Row) -> Result<Row, AppError>;

    /// Apply `changes` to the row at `id` and commit. `None` when no such row.
    async fn update(&self, model: &Model, id: &Value, changes: &Row) -> Result<Option<Row>, AppError>;

    /// Delete the row at `id` and commit. Returns the deleted row, `None` when no such row.
    async fn delete(&self, model: &Model, id: &Value) -> Result<Option<Row>, AppError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// JSON equality with numbers compared by value (`1` == `1.0`).
pub(crate) fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_offset() {
        assert_eq!(Page { number: 1, size: 20 }.offset(), 0);
        assert_eq!(Page { number: 3, size: 20 }.offset(), 40);
    }

    #[test]
    fn numeric_equality() {
        assert!(value_eq(&json!(1), &json!(1.0)));
        assert!(!value_eq(&json!(1), &json!("1")));
    }
}
