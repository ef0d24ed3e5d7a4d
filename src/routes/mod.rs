//! Route construction: per-model resource routes and common service routes.

pub mod common;
pub mod registrar;

pub use common::common_routes;
pub use registrar::Registrar;
