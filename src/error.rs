//! Typed errors and HTTP mapping. Every error rendered to a client is logged with a fresh `error_token`.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
    #[error("invalid primary key: model {model} field {field}")]
    InvalidPrimaryKey { model: String, field: String },
    #[error("validation: {0}")]
    Validation(String),
}

/// Message sent for errors that carry no client-safe description.
pub const GENERIC_MESSAGE: &str = "An error occurred.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{message}")]
    BadRequest { message: String, details: Option<serde_json::Value> },
    #[error("{message}")]
    Forbidden { message: String, details: Option<serde_json::Value> },
    #[error("{message}")]
    NotAcceptable { message: String, details: Option<serde_json::Value> },
    #[error("{message}")]
    NotFound { message: String, details: Option<serde_json::Value> },
    #[error("{message}")]
    Conflict { message: String, details: Option<serde_json::Value> },
    #[error("{message}")]
    ServerError { message: String, details: Option<serde_json::Value> },
    #[error("{message}")]
    NotImplemented { message: String, details: Option<serde_json::Value> },
    #[error("{message}")]
    ServiceUnavailable { message: String, details: Option<serde_json::Value> },
    /// Rejection raised outside the handlers (method routing, extractors, layers).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest { message: message.into(), details: None }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden { message: message.into(), details: None }
    }

    pub fn not_acceptable(message: impl Into<String>) -> Self {
        AppError::NotAcceptable { message: message.into(), details: None }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound { message: message.into(), details: None }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict { message: message.into(), details: None }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        AppError::ServerError { message: message.into(), details: None }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        AppError::NotImplemented { message: message.into(), details: None }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        AppError::ServiceUnavailable { message: message.into(), details: None }
    }

    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Rejected { status, message: message.into() }
    }

    /// Attach structured detail to a classified error. Unclassified errors are returned unchanged.
    pub fn with_details(mut self, value: serde_json::Value) -> Self {
        match &mut self {
            AppError::BadRequest { details, .. }
            | AppError::Forbidden { details, .. }
            | AppError::NotAcceptable { details, .. }
            | AppError::NotFound { details, .. }
            | AppError::Conflict { details, .. }
            | AppError::ServerError { details, .. }
            | AppError::NotImplemented { details, .. }
            | AppError::ServiceUnavailable { details, .. } => *details = Some(value),
            AppError::Rejected { .. } | AppError::Config(_) | AppError::Db(_) | AppError::Internal(_) => {}
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Rejected { status, .. } => *status,
            AppError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Db(e) if is_unique_violation(e) => StatusCode::CONFLICT,
            AppError::Config(_) | AppError::Db(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message and details. `None` for unclassified errors, whose text must not leak.
    fn public_parts(&self) -> Option<(String, Option<serde_json::Value>)> {
        match self {
            AppError::BadRequest { message, details }
            | AppError::Forbidden { message, details }
            | AppError::NotAcceptable { message, details }
            | AppError::NotFound { message, details }
            | AppError::Conflict { message, details }
            | AppError::ServerError { message, details }
            | AppError::NotImplemented { message, details }
            | AppError::ServiceUnavailable { message, details } => Some((message.clone(), details.clone())),
            AppError::Rejected { message, .. } => Some((message.clone(), None)),
            AppError::Db(sqlx::Error::RowNotFound) => Some(("resource not found".into(), None)),
            AppError::Db(e) if is_unique_violation(e) => Some(("resource already exists".into(), None)),
            AppError::Config(_) | AppError::Db(_) | AppError::Internal(_) => None,
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub error_token: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_token = uuid::Uuid::new_v4().to_string();
        let status = self.status();
        tracing::error!(error_token = %error_token, status = status.as_u16(), error = %self, "request failed");
        let (message, details) = self
            .public_parts()
            .unwrap_or_else(|| (GENERIC_MESSAGE.to_string(), None));
        let body = ErrorBody {
            message,
            details,
            error_token,
        };
        (status, Json(body)).into_response()
    }
}

/// Re-encode plain-text rejections (405, 413, extractor failures) as `ErrorBody`.
/// JSON error responses pass through untouched.
pub async fn json_rejections(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }
    let allow = response.headers().get(header::ALLOW).cloned();
    let text = match axum::body::to_bytes(response.into_body(), 4096).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    let message = if text.is_empty() {
        status.canonical_reason().unwrap_or("request rejected").to_string()
    } else {
        text
    };
    let mut response = AppError::rejected(status, message).into_response();
    if let Some(allow) = allow {
        response.headers_mut().insert(header::ALLOW, allow);
    }
    response
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_statuses() {
        assert_eq!(AppError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_acceptable("x").status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(AppError::server_error("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::not_implemented("x").status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(AppError::service_unavailable("x").status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::Db(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unclassified_hides_message() {
        let err = AppError::Internal("connection reset by peer".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.public_parts().is_none());
        let err = AppError::Db(sqlx::Error::PoolTimedOut);
        assert!(err.public_parts().is_none());
    }

    #[test]
    fn details_only_on_classified() {
        let err = AppError::bad_request("bad").with_details(serde_json::json!({"field": "name"}));
        let (msg, details) = err.public_parts().unwrap();
        assert_eq!(msg, "bad");
        assert_eq!(details.unwrap()["field"], "name");
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn plain_rejection_becomes_error_body() {
        let plain = (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET,HEAD")], "").into_response();
        let response = json_rejections(plain).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET,HEAD");
        let body = body_json(response).await;
        assert_eq!(body["message"], "Method Not Allowed");
        assert!(body["error_token"].is_string());

        let plain = (StatusCode::BAD_REQUEST, "Failed to deserialize query string").into_response();
        let body = body_json(json_rejections(plain).await).await;
        assert_eq!(body["message"], "Failed to deserialize query string");
    }

    #[tokio::test]
    async fn json_and_success_pass_through() {
        let ok = (StatusCode::OK, "fine").into_response();
        assert_eq!(json_rejections(ok).await.status(), StatusCode::OK);

        let err = AppError::not_found("gone").into_response();
        let token = body_json(json_rejections(err).await).await["error_token"].clone();
        assert!(token.is_string());
    }
}
