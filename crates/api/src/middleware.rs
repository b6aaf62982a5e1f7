use core::str::FromStr;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use stockline_core::TenantId;

use crate::app::errors::json_error;
use crate::context::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolve the tenant for every protected route.
///
/// The tenant is the franchise chain; it comes from the `X-Tenant-Id` header
/// (a UUID). Requests without a valid tenant never reach a handler.
pub async fn require_tenant(mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok());

    let Some(raw) = header else {
        return json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "missing_tenant",
            "X-Tenant-Id header is required",
        );
    };

    let Ok(tenant_id) = TenantId::from_str(raw) else {
        return json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_tenant",
            "X-Tenant-Id must be a UUID",
        );
    };

    request
        .extensions_mut()
        .insert(TenantContext { tenant_id });
    next.run(request).await
}
