//! model-rest: REST endpoints generated from configured database models.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod serializable;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_models_from_path, models_from_str, resolve, Model, ModelConfig, Settings};
pub use error::{AppError, ConfigError};
pub use response::{JsonRenderer, RenderTriple, Renderer};
pub use routes::{common_routes, Registrar};
pub use serializable::SerializableModel;
pub use service::ResourceHandler;
pub use state::{Decorator, HandlerConfig};
pub use store::{MemorySession, PgSession, Row, Session};
