use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use crate::app::services::AppServices;
use crate::context::TenantContext;

pub async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

/// SSE feed of projection updates and low-stock alerts for this tenant.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    services.tenant_sse_stream(tenant.tenant_id).into_response()
}
