//! HTTP error mapping.
//!
//! Domain rejections keep their taxonomy all the way to the response body:
//! the `error` field is a stable machine-readable code, `message` is the
//! human-readable rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use stockline_core::DomainError;
use stockline_infra::DispatchError;
use stockline_ledger::StockError;

use crate::app::services::ServiceError;

pub fn json_error(status: StatusCode, code: &str, message: impl AsRef<str>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.as_ref(),
        })),
    )
        .into_response()
}

fn infra_error<E>(err: &DispatchError<E>) -> Response {
    match err {
        DispatchError::Domain(_) => unreachable!("domain errors are mapped by the caller"),
        DispatchError::Concurrency(msg) => {
            json_error(StatusCode::CONFLICT, "concurrency_conflict", msg)
        }
        DispatchError::TenantIsolation(msg) => {
            json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg)
        }
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "event_store",
            e.to_string(),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish", msg),
    }
}

/// Map dispatch failures for aggregates using the shared `DomainError`.
pub fn domain_dispatch_error(err: &DispatchError<DomainError>) -> Response {
    match err {
        DispatchError::Domain(domain) => match domain {
            DomainError::Validation(_) => {
                json_error(StatusCode::BAD_REQUEST, "validation", domain.to_string())
            }
            DomainError::InvalidId(_) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_id", domain.to_string())
            }
            DomainError::NotFound => {
                json_error(StatusCode::NOT_FOUND, "not_found", domain.to_string())
            }
            DomainError::Conflict(_) => {
                json_error(StatusCode::CONFLICT, "conflict", domain.to_string())
            }
            DomainError::InvariantViolation(_) => json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invariant_violation",
                domain.to_string(),
            ),
        },
        other => infra_error(other),
    }
}

/// Map dispatch failures for stock operations (the ledger taxonomy).
pub fn stock_dispatch_error(err: &DispatchError<StockError>) -> Response {
    match err {
        DispatchError::Domain(stock) => {
            let (status, code) = match stock {
                StockError::ProductNotFound => (StatusCode::NOT_FOUND, "product_not_found"),
                StockError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, "invalid_quantity"),
                StockError::ZeroAdjustment => (StatusCode::BAD_REQUEST, "zero_adjustment"),
                StockError::NoStockAvailable => (StatusCode::CONFLICT, "no_stock_available"),
                StockError::InsufficientStock { .. } => {
                    (StatusCode::CONFLICT, "insufficient_stock")
                }
                StockError::NegativeBalanceRejected { .. } => {
                    (StatusCode::CONFLICT, "negative_balance_rejected")
                }
                StockError::StreamMismatch(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "stream_mismatch")
                }
            };
            json_error(status, code, stock.to_string())
        }
        other => infra_error(other),
    }
}

/// Map orchestration failures (sales, transfers).
pub fn service_error(err: &ServiceError) -> Response {
    match err {
        ServiceError::Stock(e) => stock_dispatch_error(e),
        ServiceError::Domain(e) => domain_dispatch_error(e),
    }
}
