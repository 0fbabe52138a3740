use crate::api::{ApiError, AppState};
use crate::jobs::{spawn_bulk_scan, ScanJob};
use crate::scanner::{analyze_bulk, save_scan, SaveScanRequest, ScanResult, SearchResponse};
use crate::storage::{lock_storage, ContactRecord};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub urls: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub city: Option<String>,
}

fn required_urls(urls: Option<Vec<String>>) -> Result<Vec<String>, ApiError> {
    urls.filter(|urls| !urls.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Zadejte pole URL adres".to_string()))
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ScanResult>, ApiError> {
    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL je povinné".to_string()))?;

    Ok(Json(state.analyzer.analyze(&url).await))
}

pub async fn bulk_analyze(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<Vec<ScanResult>>, ApiError> {
    let urls = required_urls(request.urls)?;
    Ok(Json(analyze_bulk(&state.analyzer, &urls).await))
}

pub async fn save(
    State(state): State<AppState>,
    Json(request): Json<SaveScanRequest>,
) -> Result<(StatusCode, Json<ContactRecord>), ApiError> {
    let contact = {
        let mut storage = lock_storage(&state.storage)?;
        save_scan(&mut *storage, &request, Utc::now())?
    };
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = request
        .query
        .filter(|query| !query.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Zadejte vyhledávací dotaz".to_string()))?;

    Ok(Json(
        state.search.search(&query, request.city.as_deref()).await,
    ))
}

pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<Value>, ApiError> {
    let urls = required_urls(request.urls)?;
    let job_id = spawn_bulk_scan(state.scan_jobs.clone(), state.analyzer.clone(), urls);
    Ok(Json(json!({ "job_id": job_id, "status": "started" })))
}

pub async fn poll_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanJob>, ApiError> {
    state
        .scan_jobs
        .poll(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))
}
