//! HTTP surface: axum router, tenant middleware, application services.

pub mod app;
pub mod context;
pub mod middleware;
