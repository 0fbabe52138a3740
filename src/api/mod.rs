//! HTTP surface
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/api/scanner/analyze` | analyze one URL |
//! | POST | `/api/scanner/bulk-analyze` | analyze up to 20 URLs |
//! | POST | `/api/scanner/save` | store a scan as a contact |
//! | POST | `/api/scanner/search` | find candidate businesses |
//! | POST | `/api/scanner/jobs` | start a background bulk scan |
//! | GET | `/api/scanner/jobs/:id` | poll a background scan |
//! | POST | `/api/sequences/:id/enroll` | enroll contacts |
//! | POST | `/api/sequences/enrollments/:id/cancel` | cancel an enrollment |
//! | GET | `/api/track/open/:tracking_id` | open-tracking pixel |

mod error;
mod scanner;
mod sequences;
mod tracking;

pub use error::ApiError;

use crate::jobs::ScanJobStore;
use crate::scanner::{LeadSearch, SiteAnalyzer};
use crate::storage::SharedStorage;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub storage: SharedStorage,
    pub analyzer: SiteAnalyzer,
    pub search: Arc<LeadSearch>,
    pub scan_jobs: Arc<ScanJobStore>,
}

/// Builds the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/scanner/analyze", post(scanner::analyze))
        .route("/api/scanner/bulk-analyze", post(scanner::bulk_analyze))
        .route("/api/scanner/save", post(scanner::save))
        .route("/api/scanner/search", post(scanner::search))
        .route("/api/scanner/jobs", post(scanner::submit_job))
        .route("/api/scanner/jobs/:id", get(scanner::poll_job))
        .route("/api/sequences/:id/enroll", post(sequences::enroll))
        .route(
            "/api/sequences/enrollments/:id/cancel",
            post(sequences::cancel),
        )
        .route("/api/track/open/:tracking_id", get(tracking::open))
        .with_state(state)
}
