//! ResourceHandler: the five CRUD operations for one bound model, forwarded to a session.

use crate::config::Model;
use crate::error::AppError;
use crate::response::RenderTriple;
use crate::serializable::SerializableModel;
use crate::service::validation::{Completeness, RequestValidator};
use crate::state::{Decorator, HandlerConfig};
use crate::store::{ListQuery, Page, Session};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::sync::Arc;

pub struct ResourceHandler {
    serializable: SerializableModel,
    session: Arc<dyn Session>,
    config: HandlerConfig,
}

impl ResourceHandler {
    pub fn new(serializable: SerializableModel, session: Arc<dyn Session>, config: HandlerConfig) -> Self {
        ResourceHandler {
            serializable,
            session,
            config,
        }
    }

    pub fn model(&self) -> &Model {
        self.serializable.model()
    }

    pub fn is_readonly(&self) -> bool {
        self.config.readonly
    }

    pub fn decorators(&self) -> &[Decorator] {
        &self.config.decorators
    }

    /// Pass a triple through the configured renderer.
    pub fn respond(&self, triple: RenderTriple) -> Response {
        match &self.config.renderer {
            Some(renderer) => renderer.render(triple),
            None => triple.into_response(),
        }
    }

    /// GET: list without an id, batch list for `a,b,c`, single row otherwise.
    pub async fn get(&self, resource_id: Option<&str>, params: &[(String, String)]) -> Result<RenderTriple, AppError> {
        match resource_id {
            None => self.all_resources(params, None).await,
            Some(id) if id.contains(',') => {
                let ids = self.model().parse_ids(id)?;
                self.all_resources(params, Some(ids)).await
            }
            Some(id_str) => {
                let id = self.model().parse_id(id_str)?;
                let row = self
                    .session
                    .fetch(self.model(), &id)
                    .await?
                    .ok_or_else(|| self.not_found(id_str))?;
                Ok(RenderTriple::ok(self.serializable.to_dict(&row)))
            }
        }
    }

    /// POST: create unless a row with exactly these field values exists (then 204).
    pub async fn post(&self, body: Option<Value>) -> Result<RenderTriple, AppError> {
        self.ensure_writable()?;
        let model = self.model();
        let data = RequestValidator::verify(model, body, Completeness::Full)?;
        if self.session.find_matching(model, &data).await?.is_some() {
            tracing::debug!(model = %model.name, "matching resource exists, not creating");
            return Ok(RenderTriple::no_content());
        }
        let row = self.serializable.instantiate(&data);
        let stored = self.session.insert(model, &row).await?;
        Ok(RenderTriple::created(self.serializable.to_dict(&stored)))
    }

    /// PUT: create at the path id when absent, otherwise update in place. 201 either way.
    pub async fn put(&self, resource_id: &str, body: Option<Value>) -> Result<RenderTriple, AppError> {
        self.ensure_writable()?;
        let model = self.model();
        let id = model.parse_id(resource_id)?;
        let data = RequestValidator::verify(model, body, Completeness::Full)?;
        let stored = match self.session.fetch(model, &id).await? {
            None => {
                let mut row = self.serializable.instantiate(&data);
                row.insert(model.primary_key.clone(), id);
                self.session.insert(model, &row).await?
            }
            Some(mut row) => {
                self.serializable.from_dict(&mut row, &data);
                self.session
                    .update(model, &id, &row)
                    .await?
                    .ok_or_else(|| self.not_found(resource_id))?
            }
        };
        Ok(RenderTriple::created(self.serializable.to_dict(&stored)))
    }

    /// PATCH: update of an existing row. Required fields are guarded as for POST/PUT;
    /// only supplied fields are written.
    pub async fn patch(&self, resource_id: &str, body: Option<Value>) -> Result<RenderTriple, AppError> {
        self.ensure_writable()?;
        let model = self.model();
        let id = model.parse_id(resource_id)?;
        let data = RequestValidator::verify(model, body, Completeness::Full)?;
        let mut row = self
            .session
            .fetch(model, &id)
            .await?
            .ok_or_else(|| self.not_found(resource_id))?;
        self.serializable.from_dict(&mut row, &data);
        let stored = self
            .session
            .update(model, &id, &row)
            .await?
            .ok_or_else(|| self.not_found(resource_id))?;
        Ok(RenderTriple::created(self.serializable.to_dict(&stored)))
    }

    pub async fn delete(&self, resource_id: &str) -> Result<RenderTriple, AppError> {
        self.ensure_writable()?;
        let model = self.model();
        let id = model.parse_id(resource_id)?;
        self.session
            .delete(model, &id)
            .await?
            .ok_or_else(|| self.not_found(resource_id))?;
        Ok(RenderTriple::no_content())
    }

    async fn all_resources(
        &self,
        params: &[(String, String)],
        ids: Option<Vec<Value>>,
    ) -> Result<RenderTriple, AppError> {
        let model = self.model();
        let mut filters: Vec<(String, Vec<Value>)> = Vec::new();
        for (key, raw) in params {
            if !model.has_field(key) {
                continue;
            }
            let value = model.coerce_query_value(key, raw);
            match filters.iter_mut().find(|(k, _)| k == key) {
                Some((_, values)) => values.push(value),
                None => filters.push((key.clone(), vec![value])),
            }
        }

        let page = match params.iter().find(|(k, _)| k == "page") {
            Some((_, raw)) => {
                let number: u32 = raw
                    .trim()
                    .parse()
                    .map_err(|_| AppError::bad_request("page must be a positive integer"))?;
                if number == 0 {
                    return Err(AppError::not_found("page out of range"));
                }
                Some(Page {
                    number,
                    size: self.config.page_size,
                })
            }
            None => None,
        };

        let query = ListQuery { filters, ids, page };
        let rows = self.session.list(model, &query).await?;
        if rows.is_empty() && page.map(|p| p.number > 1).unwrap_or(false) {
            return Err(AppError::not_found("page out of range"));
        }
        tracing::debug!(model = %model.name, count = rows.len(), "listed resources");
        let resources: Vec<Value> = rows.iter().map(|r| self.serializable.to_dict(r)).collect();
        Ok(RenderTriple::ok(serde_json::json!({ "resources": resources })))
    }

    fn ensure_writable(&self) -> Result<(), AppError> {
        if self.config.readonly {
            return Err(AppError::forbidden(format!("{} is read-only", self.model().table)));
        }
        Ok(())
    }

    fn not_found(&self, resource_id: &str) -> AppError {
        AppError::not_found("Resource not found").with_details(serde_json::json!({
            "resource": self.model().table,
            "id": resource_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{models_from_str, resolve};
    use crate::store::MemorySession;
    use axum::http::StatusCode;
    use serde_json::json;

    fn handler(session: Arc<dyn Session>, readonly: bool) -> ResourceHandler {
        let configs = models_from_str(
            r#"[{"name": "Note", "table": "notes", "fields": [
                {"name": "id", "type": "integer", "nullable": false},
                {"name": "body", "type": "text", "nullable": false}
            ]}]"#,
        )
        .unwrap();
        let model = resolve(&configs).unwrap().remove(0);
        let config = HandlerConfig {
            readonly,
            page_size: 10,
            decorators: Vec::new(),
            renderer: None,
        };
        ResourceHandler::new(SerializableModel::new(model), session, config)
    }

    #[tokio::test]
    async fn readonly_handler_refuses_mutations() {
        let session: Arc<dyn Session> = Arc::new(MemorySession::new());
        let writable = handler(session.clone(), false);
        let created = writable.post(Some(json!({"body": "hello"}))).await.unwrap();
        assert_eq!(created.status, StatusCode::CREATED);

        let ro = handler(session, true);
        let body = Some(json!({"body": "changed"}));
        for err in [
            ro.post(body.clone()).await.unwrap_err(),
            ro.put("1", body.clone()).await.unwrap_err(),
            ro.patch("1", body).await.unwrap_err(),
            ro.delete("1").await.unwrap_err(),
        ] {
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
        }

        let fetched = ro.get(Some("1"), &[]).await.unwrap();
        assert_eq!(fetched.body, Some(json!({"id": 1, "body": "hello"})));
    }
}
