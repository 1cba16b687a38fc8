use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_core::{DomainError, ErrorClass};
use stockroom_infra::{ServiceError, StoreError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(StoreError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage error",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match (&err, err.class()) {
        (DomainError::InvalidQuantity(_), _) => StatusCode::UNPROCESSABLE_ENTITY,
        (_, ErrorClass::BadRequest) => StatusCode::BAD_REQUEST,
        (_, ErrorClass::Conflict) => StatusCode::CONFLICT,
        (_, ErrorClass::NotFound) => StatusCode::NOT_FOUND,
        (_, ErrorClass::Unauthorized) => StatusCode::UNAUTHORIZED,
    };
    json_error(status, error_code(&err), err.to_string())
}

fn error_code(err: &DomainError) -> &'static str {
    match err {
        DomainError::ProductNotFound(_) => "product_not_found",
        DomainError::InsufficientStock { .. } => "insufficient_stock",
        DomainError::InvalidQuantity(_) => "invalid_quantity",
        DomainError::Validation(_) => "validation_error",
        DomainError::InvalidId(_) => "invalid_id",
        DomainError::SaleNotFound(_) => "sale_not_found",
        DomainError::AlreadyCancelled(_) => "already_cancelled",
        DomainError::SessionNotFound(_) => "session_not_found",
        DomainError::SessionCompleted(_) => "session_completed",
        DomainError::AlreadyCompleted(_) => "already_completed",
        DomainError::ProductNotInSession { .. } => "product_not_in_session",
        DomainError::InvalidSignature => "invalid_signature",
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// `status` + JSON body on success, the mapped error otherwise.
pub fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, ServiceError>,
) -> axum::response::Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(e) => service_error_to_response(e),
    }
}
