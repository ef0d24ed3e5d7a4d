//! Per-model handler configuration, captured at registration and never mutated afterwards.

use crate::response::Renderer;
use axum::Router;
use std::sync::Arc;

/// Wraps a model's routes, typically to add a tower layer or middleware.
pub type Decorator = Arc<dyn Fn(Router) -> Router + Send + Sync>;

#[derive(Clone)]
pub struct HandlerConfig {
    /// Only GET is exposed when set.
    pub readonly: bool,
    pub page_size: u32,
    pub decorators: Vec<Decorator>,
    /// `None` leaves rendering to the triple's own JSON encoding.
    pub renderer: Option<Arc<dyn Renderer>>,
}
