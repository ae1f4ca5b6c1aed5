//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::admission::{AdmissionError, BlockedCheck, DuplicateCheckResult};
use crate::models::OrderMatch;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
///
/// The two 409 variants carry the duplicate-check payload so clients can
/// show the colliding record and, for the confirmable case, retry with
/// `confirm=true`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Duplicate record conflict")]
    DuplicateBlocked(BlockedCheck),
    #[error("Similar order exists, confirmation required")]
    ConfirmationRequired {
        warnings: Vec<String>,
        order_check: DuplicateCheckResult<OrderMatch>,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(detail) => simple(StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::NotFound(detail) => simple(StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::DuplicateBlocked(check) => {
                let mut body = json!({
                    "error": {
                        "code": "DUPLICATE_BLOCKED",
                        "message": "A conflicting record already exists",
                    },
                });
                merge(&mut body, &check);
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
            ApiError::ConfirmationRequired {
                warnings,
                order_check,
            } => {
                let body = json!({
                    "error": {
                        "code": "CONFIRMATION_REQUIRED",
                        "message": "A similar order exists. Resubmit with confirm=true to proceed",
                    },
                    "needs_confirmation": true,
                    "warnings": warnings,
                    "duplicate_check": order_check,
                });
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                simple(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

fn simple(status: StatusCode, code: &'static str, message: String) -> Response {
    let body = ErrorBody {
        error: ErrorDetail { code, message },
    };
    (status, Json(body)).into_response()
}

/// Fold the serialized `BlockedCheck` fields (`stage`, `duplicate_check`)
/// into the top-level response body.
fn merge(body: &mut serde_json::Value, check: &BlockedCheck) {
    if let (Some(map), Ok(serde_json::Value::Object(extra))) =
        (body.as_object_mut(), serde_json::to_value(check))
    {
        map.extend(extra);
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
