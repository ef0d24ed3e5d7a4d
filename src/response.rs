//! Render triple and the pluggable render hook.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// Uniform handler result before wire encoding: body, status, headers.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderTriple {
    pub body: Option<Value>,
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
}

impl RenderTriple {
    pub fn new(body: Option<Value>, status: StatusCode) -> Self {
        RenderTriple {
            body,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(Some(body), StatusCode::OK)
    }

    pub fn created(body: Value) -> Self {
        Self::new(Some(body), StatusCode::CREATED)
    }

    pub fn no_content() -> Self {
        Self::new(None, StatusCode::NO_CONTENT)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Body as JSON (none for an empty body), status as given, each header attached.
/// Headers that are not valid HTTP are dropped with a warning.
impl IntoResponse for RenderTriple {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(n), Ok(v)) => {
                    response.headers_mut().append(n, v);
                }
                _ => tracing::warn!(header = %name, "dropping invalid response header"),
            }
        }
        response
    }
}

/// Render hook: turns a triple into the wire response.
pub trait Renderer: Send + Sync {
    fn render(&self, triple: RenderTriple) -> Response;
}

/// Default renderer: JSON body, status code, headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, triple: RenderTriple) -> Response {
        triple.into_response()
    }
}

impl<F> Renderer for F
where
    F: Fn(RenderTriple) -> Response + Send + Sync,
{
    fn render(&self, triple: RenderTriple) -> Response {
        self(triple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use serde_json::json;

    #[tokio::test]
    async fn json_renderer_writes_body_status_headers() {
        let triple = RenderTriple::created(json!({"id": 1})).with_header("x-resource", "widgets");
        let response = JsonRenderer.render(triple);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-resource"], "widgets");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"id": 1}));
    }

    #[tokio::test]
    async fn no_content_has_empty_body() {
        let response = JsonRenderer.render(RenderTriple::no_content());
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn invalid_header_dropped() {
        let response = RenderTriple::ok(json!({})).with_header("bad header", "v").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("bad header").is_none());
    }

    #[test]
    fn closures_are_renderers() {
        let r = |t: RenderTriple| (StatusCode::IM_A_TEAPOT, format!("{}", t.status.as_u16())).into_response();
        assert_eq!(r.render(RenderTriple::no_content()).status(), StatusCode::IM_A_TEAPOT);
    }
}
