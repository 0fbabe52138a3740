use crate::LeadscopeError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-level failures, rendered as `{"error": ...}` JSON
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Kontakt s touto doménou již existuje")]
    DuplicateDomain { existing_id: i64 },

    #[error("Internal error: {0}")]
    Internal(LeadscopeError),
}

impl From<LeadscopeError> for ApiError {
    fn from(e: LeadscopeError) -> Self {
        match e {
            LeadscopeError::DuplicateDomain { existing_id, .. } => {
                Self::DuplicateDomain { existing_id }
            }
            LeadscopeError::Sequence(e) => Self::BadRequest(e.to_string()),
            other => Self::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            Self::DuplicateDomain { existing_id } => (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "Kontakt s touto doménou již existuje",
                    "existing_id": existing_id,
                })),
            )
                .into_response(),
            Self::Internal(e) => {
                error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Interní chyba serveru" })),
                )
                    .into_response()
            }
        }
    }
}
