use crate::api::AppState;
use crate::mail::{record_open, TRACKING_PIXEL};
use crate::storage::lock_storage;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::warn;

/// Records the open and always answers with the pixel
pub async fn open(
    State(state): State<AppState>,
    Path(tracking_id): Path<String>,
) -> impl IntoResponse {
    let recorded = lock_storage(&state.storage)
        .and_then(|mut storage| Ok(record_open(&mut *storage, &tracking_id, Utc::now())?));
    if let Err(e) = recorded {
        warn!("Failed to record open for {}: {}", tracking_id, e);
    }

    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        &TRACKING_PIXEL[..],
    )
}
