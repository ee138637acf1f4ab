//! API error taxonomy and HTTP status mapping.
//!
//! Parse, authentication and validation errors are terminal and reported
//! synchronously with a 4xx status. Internal errors are logged with full
//! context and surface to the untrusted caller as a bare 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::error;
use triage_common::{ErrorResponse, FieldViolation};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Payload unrecoverable by any repair strategy.
    #[error("Failed to parse payload")]
    Parse { details: Option<String> },

    /// Signature or secret mismatch.
    #[error("authentication failed")]
    Authentication,

    /// Schema violated; one entry per violated field.
    #[error("schema validation failed")]
    Validation(Vec<FieldViolation>),

    /// Downstream failure: classification call, record-store call, or
    /// unexpected error. Details stay in the logs.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Parse { details } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Failed to parse payload".to_string(),
                    details: details.map(Value::String),
                },
            ),
            ApiError::Authentication => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "authentication failed".to_string(),
                    details: None,
                },
            ),
            ApiError::Validation(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "schema validation failed".to_string(),
                    details: Some(serde_json::to_value(&violations).unwrap_or(Value::Null)),
                },
            ),
            ApiError::Internal(e) => {
                error!("internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal error".to_string(),
                        details: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
