use core::str::FromStr;
use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use stockline_core::FranchiseId;

use crate::app::dto::RegisterFranchiseRequest;
use crate::app::errors::{domain_dispatch_error, json_error};
use crate::app::services::AppServices;
use crate::context::TenantContext;

fn parse_franchise_id(raw: &str) -> Result<FranchiseId, Response> {
    FranchiseId::from_str(raw)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<RegisterFranchiseRequest>,
) -> Response {
    match services.register_franchise(tenant.tenant_id, body.name, body.city) {
        Ok(franchise_id) => (
            StatusCode::CREATED,
            Json(json!({ "franchise_id": franchise_id })),
        )
            .into_response(),
        Err(err) => domain_dispatch_error(&err),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    Json(services.list_franchises(tenant.tenant_id)).into_response()
}

pub async fn close(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let franchise_id = match parse_franchise_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.close_franchise(tenant.tenant_id, franchise_id) {
        Ok(()) => Json(json!({ "franchise_id": franchise_id, "status": "closed" })).into_response(),
        Err(err) => domain_dispatch_error(&err),
    }
}
