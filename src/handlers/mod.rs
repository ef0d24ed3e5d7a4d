//! HTTP handlers for bound model resources.

pub mod resource;
pub use resource::*;
