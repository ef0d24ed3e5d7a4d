//! PostgreSQL session over a sqlx pool.

use crate::config::{Field, FieldType, Model};
use crate::error::AppError;
use crate::sql::{self, PgBindValue, QueryBuf};
use crate::store::{ListQuery, Row, Session};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool};

#[derive(Clone)]
pub struct PgSession {
    pool: PgPool,
}

impl PgSession {
    pub fn new(pool: PgPool) -> Self {
        PgSession { pool }
    }

    async fn fetch_optional(&self, model: &Model, q: &QueryBuf) -> Result<Option<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(model, &r)))
    }

    async fn fetch_many(&self, model: &Model, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(&q.sql, &q.params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| row_to_json(model, r)).collect())
    }

    /// Run one mutating statement in its own transaction.
    async fn commit_one(&self, model: &Model, q: &QueryBuf) -> Result<Option<Row>, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = execute_returning_one_tx(&mut tx, model, q).await?;
        tx.commit().await?;
        Ok(row)
    }
}

fn bind_all<'q>(
    sql: &'q str,
    params: &[Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

async fn execute_returning_one_tx(
    tx: &mut PgConnection,
    model: &Model,
    q: &QueryBuf,
) -> Result<Option<Row>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
    let row = bind_all(&q.sql, &q.params).fetch_optional(&mut *tx).await?;
    Ok(row.map(|r| row_to_json(model, &r)))
}

#[async_trait]
impl Session for PgSession {
    async fn fetch(&self, model: &Model, id: &Value) -> Result<Option<Row>, AppError> {
        self.fetch_optional(model, &sql::select_by_id(model, id)).await
    }

    async fn list(&self, model: &Model, query: &ListQuery) -> Result<Vec<Row>, AppError> {
        self.fetch_many(model, &sql::select_list(model, query)).await
    }

    async fn find_matching(&self, model: &Model, fields: &Row) -> Result<Option<Row>, AppError> {
        self.fetch_optional(model, &sql::select_matching(model, fields)).await
    }

    async fn insert(&self, model: &Model, row: &Row) -> Result<Row, AppError> {
        self.commit_one(model, &sql::insert(model, row))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, model: &Model, id: &Value, changes: &Row) -> Result<Option<Row>, AppError> {
        self.commit_one(model, &sql::update(model, id, changes)).await
    }

    async fn delete(&self, model: &Model, id: &Value) -> Result<Option<Row>, AppError> {
        self.commit_one(model, &sql::delete(model, id)).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

fn row_to_json(model: &Model, row: &PgRow) -> Row {
    let mut map = Row::new();
    for f in &model.fields {
        map.insert(f.name.clone(), cell_to_value(row, f));
    }
    map
}

/// Decode one column by its declared type. Undecodable cells become null.
fn cell_to_value(row: &PgRow, field: &Field) -> Value {
    use sqlx::Row as _;
    let name = field.name.as_str();
    let decoded = match field.field_type {
        FieldType::Integer => row
            .try_get::<Option<i32>, _>(name)
            .map(|v| v.map(|n| Value::Number(n.into()))),
        FieldType::BigInt => row
            .try_get::<Option<i64>, _>(name)
            .map(|v| v.map(|n| Value::Number(n.into()))),
        FieldType::Float => row
            .try_get::<Option<f64>, _>(name)
            .map(|v| v.and_then(serde_json::Number::from_f64).map(Value::Number)),
        FieldType::Text => row.try_get::<Option<String>, _>(name).map(|v| v.map(Value::String)),
        FieldType::Boolean => row.try_get::<Option<bool>, _>(name).map(|v| v.map(Value::Bool)),
        FieldType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        FieldType::Timestamptz => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339()))),
        FieldType::Timestamp => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(name)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        FieldType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        FieldType::Json => row.try_get::<Option<Value>, _>(name),
    };
    match decoded {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(column = %name, error = %e, "column decode failed");
            Value::Null
        }
    }
}
