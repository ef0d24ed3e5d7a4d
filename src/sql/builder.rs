//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved model.
//! Identifiers come from model definitions only; values are always bound parameters.

use crate::config::Model;
use crate::store::{ListQuery, Row};
use serde_json::Value;

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Table name, schema-qualified when the model names a schema.
fn qualified_table(model: &Model) -> String {
    match &model.schema {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(&model.table)),
        None => quoted(&model.table),
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its cast placeholder for `field`.
    fn placeholder(&mut self, model: &Model, field: &str, v: Value) -> String {
        self.params.push(v);
        let n = self.params.len();
        match model.field(field) {
            Some(f) => format!("${}::{}", n, f.field_type.pg_type()),
            None => format!("${}", n),
        }
    }
}

fn select_column_list(model: &Model) -> String {
    model
        .fields
        .iter()
        .map(|f| quoted(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT by primary key.
pub fn select_by_id(model: &Model, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(model, &model.primary_key, id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(model),
        qualified_table(model),
        quoted(&model.primary_key),
        ph
    );
    q
}

/// SELECT list: `col IN (...)` per filter, optional pk IN (ids), ORDER BY pk, LIMIT/OFFSET for a page.
pub fn select_list(model: &Model, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();

    for (col, values) in &query.filters {
        if !model.has_field(col) {
            continue;
        }
        where_parts.push(in_clause(&mut q, model, col, values));
    }
    if let Some(ids) = &query.ids {
        where_parts.push(in_clause(&mut q, model, &model.primary_key, ids));
    }

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let page_clause = query
        .page
        .map(|p| format!(" LIMIT {} OFFSET {}", p.size, p.offset()))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}{}",
        select_column_list(model),
        qualified_table(model),
        where_clause,
        quoted(&model.primary_key),
        page_clause
    );
    q
}

fn in_clause(q: &mut QueryBuf, model: &Model, col: &str, values: &[Value]) -> String {
    if values.is_empty() {
        return "1 = 0".into();
    }
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| q.placeholder(model, col, v.clone()))
        .collect();
    format!("{} IN ({})", quoted(col), placeholders.join(", "))
}

/// SELECT the first row whose fields all equal `fields` (NULL matches NULL).
pub fn select_matching(model: &Model, fields: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for f in &model.fields {
        let Some(v) = fields.get(&f.name) else { continue };
        let ph = q.placeholder(model, &f.name, v.clone());
        where_parts.push(format!("{} IS NOT DISTINCT FROM {}", quoted(&f.name), ph));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT 1",
        select_column_list(model),
        qualified_table(model),
        where_clause,
        quoted(&model.primary_key)
    );
    q
}

/// INSERT the declared fields present in `row`. Missing fields are omitted so the database applies its defaults.
pub fn insert(model: &Model, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &model.fields {
        let Some(v) = row.get(&f.name) else { continue };
        if f.is_pk && v.is_null() {
            continue;
        }
        placeholders.push(q.placeholder(model, &f.name, v.clone()));
        cols.push(quoted(&f.name));
    }
    let returning = select_column_list(model);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", qualified_table(model), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(model),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only declared, non-key fields present in `changes`.
pub fn update(model: &Model, id: &Value, changes: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in &model.fields {
        if f.is_pk {
            continue;
        }
        let Some(v) = changes.get(&f.name) else { continue };
        let ph = q.placeholder(model, &f.name, v.clone());
        sets.push(format!("{} = {}", quoted(&f.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(model, id);
    }
    let id_ph = q.placeholder(model, &model.primary_key, id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(model),
        sets.join(", "),
        quoted(&model.primary_key),
        id_ph,
        select_column_list(model)
    );
    q
}

/// DELETE by id, returning the deleted row.
pub fn delete(model: &Model, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(model, &model.primary_key, id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(model),
        quoted(&model.primary_key),
        ph,
        select_column_list(model)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, ModelConfig};
    use crate::store::Page;
    use serde_json::json;

    fn model() -> Model {
        let cfg: ModelConfig = serde_json::from_value(json!({
            "name": "Book",
            "table": "books",
            "schema": "library",
            "fields": [
                {"name": "id", "type": "integer", "nullable": false},
                {"name": "title", "type": "text", "nullable": false},
                {"name": "year", "type": "integer"}
            ]
        }))
        .unwrap();
        resolve(&[cfg]).unwrap().remove(0)
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn select_one() {
        let q = select_by_id(&model(), &json!(3));
        assert_eq!(
            q.sql,
            r#"SELECT "id", "title", "year" FROM "library"."books" WHERE "id" = $1::integer"#
        );
        assert_eq!(q.params, vec![json!(3)]);
    }

    #[test]
    fn select_list_filters_ids_and_page() {
        let query = ListQuery {
            filters: vec![
                ("year".into(), vec![json!(1999), json!(2001)]),
                ("nope".into(), vec![json!(1)]),
            ],
            ids: Some(vec![json!(1), json!(2)]),
            page: Some(Page { number: 3, size: 20 }),
        };
        let q = select_list(&model(), &query);
        assert_eq!(
            q.sql,
            r#"SELECT "id", "title", "year" FROM "library"."books" WHERE "year" IN ($1::integer, $2::integer) AND "id" IN ($3::integer, $4::integer) ORDER BY "id" LIMIT 20 OFFSET 40"#
        );
        assert_eq!(q.params.len(), 4);
    }

    #[test]
    fn select_list_unfiltered() {
        let q = select_list(&model(), &ListQuery::default());
        assert_eq!(q.sql, r#"SELECT "id", "title", "year" FROM "library"."books" ORDER BY "id""#);
        assert!(q.params.is_empty());
    }

    #[test]
    fn matching_uses_null_safe_equality() {
        let q = select_matching(&model(), &row(json!({"title": "Dune", "year": null})));
        assert!(q.sql.contains(r#""title" IS NOT DISTINCT FROM $1::text AND "year" IS NOT DISTINCT FROM $2::integer"#));
        assert!(q.sql.ends_with("LIMIT 1"));
    }

    #[test]
    fn insert_skips_missing_and_null_pk() {
        let q = insert(&model(), &row(json!({"id": null, "title": "Dune"})));
        assert_eq!(
            q.sql,
            r#"INSERT INTO "library"."books" ("title") VALUES ($1::text) RETURNING "id", "title", "year""#
        );
        assert_eq!(q.params, vec![json!("Dune")]);
    }

    #[test]
    fn update_never_sets_pk() {
        let q = update(&model(), &json!(9), &row(json!({"id": 10, "year": 1965})));
        assert_eq!(
            q.sql,
            r#"UPDATE "library"."books" SET "year" = $1::integer WHERE "id" = $2::integer RETURNING "id", "title", "year""#
        );
        assert_eq!(q.params, vec![json!(1965), json!(9)]);
    }

    #[test]
    fn update_without_changes_selects() {
        let q = update(&model(), &json!(9), &Row::new());
        assert!(q.sql.starts_with("SELECT"));
    }

    #[test]
    fn quoting_escapes() {
        assert_eq!(quoted(r#"we"ird"#), r#""we""ird""#);
    }
}
