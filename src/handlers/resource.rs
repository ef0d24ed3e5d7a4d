//! Axum handlers for bound models. Errors are rendered centrally by `AppError`; successes go through the model's renderer.

use crate::error::AppError;
use crate::service::ResourceHandler;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;

type Params = Query<Vec<(String, String)>>;

/// Body as JSON regardless of content type; an empty body is `None`.
fn parse_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::bad_request(format!("invalid JSON body: {}", e)))
}

fn finish(handler: &ResourceHandler, result: Result<crate::response::RenderTriple, AppError>) -> Response {
    match result {
        Ok(triple) => handler.respond(triple),
        Err(e) => e.into_response(),
    }
}

pub async fn list(State(handler): State<Arc<ResourceHandler>>, Query(params): Params) -> Response {
    let result = handler.get(None, &params).await;
    finish(&handler, result)
}

pub async fn read(
    State(handler): State<Arc<ResourceHandler>>,
    Path(resource_id): Path<String>,
    Query(params): Params,
) -> Response {
    let result = handler.get(Some(&resource_id), &params).await;
    finish(&handler, result)
}

pub async fn create(State(handler): State<Arc<ResourceHandler>>, body: Bytes) -> Response {
    let result = match parse_body(&body) {
        Ok(body) => handler.post(body).await,
        Err(e) => Err(e),
    };
    finish(&handler, result)
}

pub async fn upsert(
    State(handler): State<Arc<ResourceHandler>>,
    Path(resource_id): Path<String>,
    body: Bytes,
) -> Response {
    let result = match parse_body(&body) {
        Ok(body) => handler.put(&resource_id, body).await,
        Err(e) => Err(e),
    };
    finish(&handler, result)
}

pub async fn update(
    State(handler): State<Arc<ResourceHandler>>,
    Path(resource_id): Path<String>,
    body: Bytes,
) -> Response {
    let result = match parse_body(&body) {
        Ok(body) => handler.patch(&resource_id, body).await,
        Err(e) => Err(e),
    };
    finish(&handler, result)
}

pub async fn delete(State(handler): State<Arc<ResourceHandler>>, Path(resource_id): Path<String>) -> Response {
    let result = handler.delete(&resource_id).await;
    finish(&handler, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_parsing() {
        assert!(parse_body(&Bytes::from_static(b"")).unwrap().is_none());
        assert!(parse_body(&Bytes::from_static(b"  \n")).unwrap().is_none());
        assert_eq!(parse_body(&Bytes::from_static(b"{\"a\":1}")).unwrap(), Some(serde_json::json!({"a": 1})));
        assert!(parse_body(&Bytes::from_static(b"{oops")).is_err());
    }
}
