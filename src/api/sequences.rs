use crate::api::{ApiError, AppState};
use crate::sequence::{cancel_enrollment, enroll_request, EnrollRequest, EnrollSummary};
use crate::storage::lock_storage;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

pub async fn enroll(
    State(state): State<AppState>,
    Path(sequence_id): Path<i64>,
    Json(request): Json<EnrollRequest>,
) -> Result<Json<EnrollSummary>, ApiError> {
    let mut storage = lock_storage(&state.storage)?;
    let summary = enroll_request(&mut *storage, sequence_id, &request, Utc::now())?;
    Ok(Json(summary))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(enrollment_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let mut storage = lock_storage(&state.storage)?;
    cancel_enrollment(&mut *storage, enrollment_id)?;
    Ok(Json(json!({ "ok": true })))
}
