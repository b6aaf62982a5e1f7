//! Application wiring: router construction and shared services.

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Extension;
use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;

pub use services::{AppServices, RealtimeMessage, ServiceError, build_services};

pub fn build_app() -> Router {
    build_app_with(build_services())
}

/// Build the router around an existing service set (tests inject their own).
pub fn build_app_with(services: Arc<AppServices>) -> Router {
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(Extension(services))
            .layer(axum::middleware::from_fn(crate::middleware::require_tenant)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
