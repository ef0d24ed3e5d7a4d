//! ResourceHandler: per-model CRUD over a session, plus request validation.

mod resource;
mod validation;
pub use resource::ResourceHandler;
pub use validation::{Completeness, RequestValidator};
