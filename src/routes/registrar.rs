//! Registrar: turns model definitions into bound handlers and their routes.
//! Each model gets `/{table}` and `/{table}/:resource_id`; read-only registration binds GET only.

use crate::config::{resolve, validator, Model, ModelConfig, Settings, DEFAULT_PAGE_SIZE};
use crate::error::{json_rejections, ConfigError};
use crate::handlers::resource::{create, delete as delete_handler, list, read, update, upsert};
use crate::response::{JsonRenderer, Renderer};
use crate::serializable::SerializableModel;
use crate::service::ResourceHandler;
use crate::state::{Decorator, HandlerConfig};
use crate::store::Session;
use axum::{
    extract::Request,
    response::IntoResponse,
    routing::{get, Route},
    Router,
};
use regex::Regex;
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use tower::{Layer, Service};
use tower_http::limit::RequestBodyLimitLayer;

#[derive(Clone)]
pub struct Registrar {
    session: Arc<dyn Session>,
    url_prefix: Option<String>,
    readonly: bool,
    page_size: u32,
    decorators: Vec<Decorator>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Registrar {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Registrar {
            session,
            url_prefix: None,
            readonly: false,
            page_size: DEFAULT_PAGE_SIZE,
            decorators: Vec::new(),
            renderer: Some(Arc::new(JsonRenderer)),
        }
    }

    pub fn from_settings(session: Arc<dyn Session>, settings: &Settings) -> Self {
        let mut registrar = Self::new(session)
            .readonly(settings.readonly)
            .page_size(settings.page_size)
            .body_limit(settings.body_limit);
        if let Some(prefix) = &settings.url_prefix {
            registrar = registrar.url_prefix(prefix.clone());
        }
        registrar
    }

    /// Mount every model under `prefix`. A missing leading `/` is added, trailing `/` are
    /// dropped, and `/` alone means no prefix.
    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim().trim_matches('/');
        self.url_prefix = if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{}", trimmed))
        };
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn decorator<F>(mut self, decorator: F) -> Self
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        self.decorators.push(Arc::new(decorator));
        self
    }

    /// Decorator applying a tower layer to every model's routes.
    pub fn layer<L>(self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.decorator(move |r| r.layer(layer.clone()))
    }

    /// Reject request bodies larger than `limit` bytes with 413.
    pub fn body_limit(self, limit: usize) -> Self {
        self.layer(RequestBodyLimitLayer::new(limit))
    }

    pub fn renderer<R: Renderer + 'static>(mut self, renderer: R) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Successful results are encoded by the triple itself, without a render hook.
    pub fn without_renderer(mut self) -> Self {
        self.renderer = None;
        self
    }

    /// Validate and resolve definitions, then bind every model. Duplicate tables are rejected.
    pub fn register(&self, models: &[ModelConfig]) -> Result<Router, ConfigError> {
        self.register_resolved(resolve(models)?)
    }

    /// Bind already-resolved models, in order. Table names and the prefix are checked
    /// before any route is built.
    pub fn register_resolved(&self, models: Vec<Model>) -> Result<Router, ConfigError> {
        self.check_routable(&models)?;
        let mut router = Router::new();
        for model in models {
            let handler = Arc::new(self.bind(model));
            router = router.merge(model_routes(handler));
        }
        Ok(match &self.url_prefix {
            Some(prefix) => Router::new().nest(prefix, router),
            None => router,
        })
    }

    fn check_routable(&self, models: &[Model]) -> Result<(), ConfigError> {
        if let Some(prefix) = &self.url_prefix {
            let segments = Regex::new(r"^(/[A-Za-z0-9_.~-]+)+$").map_err(|e| ConfigError::Validation(e.to_string()))?;
            if !segments.is_match(prefix) {
                return Err(ConfigError::Validation(format!("invalid url prefix '{}'", prefix)));
            }
        }
        let ident = validator::identifier()?;
        let mut tables = HashSet::new();
        for m in models {
            if !ident.is_match(&m.table) {
                return Err(ConfigError::Validation(format!("model {}: invalid table name '{}'", m.name, m.table)));
            }
            if !tables.insert(m.table.as_str()) {
                return Err(ConfigError::DuplicateTable(m.table.clone()));
            }
        }
        Ok(())
    }

    fn bind(&self, model: Model) -> ResourceHandler {
        let config = HandlerConfig {
            readonly: self.readonly,
            page_size: self.page_size,
            decorators: self.decorators.clone(),
            renderer: self.renderer.clone(),
        };
        ResourceHandler::new(SerializableModel::new(model), self.session.clone(), config)
    }
}

fn model_routes(handler: Arc<ResourceHandler>) -> Router {
    let table = handler.model().table.clone();
    let collection = format!("/{}", table);
    let item = format!("/{}/:resource_id", table);
    let routes = if handler.is_readonly() {
        Router::new()
            .route(&collection, get(list))
            .route(&item, get(read))
    } else {
        Router::new()
            .route(&collection, get(list).post(create))
            .route(&item, get(read).put(upsert).patch(update).delete(delete_handler))
    };
    tracing::info!(
        model = %handler.model().name,
        collection = %collection,
        readonly = handler.is_readonly(),
        "bound model routes"
    );
    let decorators = handler.decorators().to_vec();
    let routes = routes.with_state(handler);
    decorators
        .iter()
        .fold(routes, |r, d| d(r))
        .layer(axum::middleware::map_response(json_rejections))
}
