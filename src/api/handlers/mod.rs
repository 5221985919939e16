//! Axum route handlers.

pub mod csv;
pub mod static_assets;
