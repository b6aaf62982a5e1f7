use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use crate::app::dto::RecordTransferRequest;
use crate::app::errors::service_error;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub async fn record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<RecordTransferRequest>,
) -> Response {
    match services.record_transfer(
        tenant.tenant_id,
        body.product_id,
        body.quantity,
        body.from_franchise_id,
        body.to_franchise_id,
        body.reason,
    ) {
        Ok(transfer_id) => (
            StatusCode::CREATED,
            Json(json!({ "transfer_id": transfer_id })),
        )
            .into_response(),
        Err(err) => service_error(&err),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    Json(services.list_transfers(tenant.tenant_id)).into_response()
}
