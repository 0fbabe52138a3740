//! Router tests driven through `tower::ServiceExt::oneshot`

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use leadscope::api::{router, AppState};
use leadscope::config::SearchConfig;
use leadscope::jobs::ScanJobStore;
use leadscope::scanner::{FetchError, FetchedPage, LeadSearch, PageFetcher, SiteAnalyzer};
use leadscope::state::{CampaignStatus, ContactStage, EnrollmentStatus};
use leadscope::storage::{
    lock_storage, shared, NewContact, NewSentEmail, SharedStorage, SqliteStorage, Storage,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

/// Serves a fixed page for every host except `down.cz`
struct FakeWeb;

#[async_trait]
impl PageFetcher for FakeWeb {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if url.host_str() == Some("down.cz") {
            return Err(FetchError {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(FetchedPage {
            final_url: url.to_string(),
            body: r#"<html><head><meta name="viewport" content="width=device-width">
                <meta property="og:site_name" content="Kadeřnictví Jana"></head>
                <body>© 2024 <a href="mailto:jana@kadernictvi.cz">jana@kadernictvi.cz</a></body></html>"#
                .to_string(),
            via_https: true,
            elapsed: Duration::from_millis(300),
        })
    }
}

fn app() -> (Router, SharedStorage) {
    let storage = shared(SqliteStorage::new_in_memory().unwrap());
    let state = AppState {
        storage: storage.clone(),
        analyzer: SiteAnalyzer::new(Arc::new(FakeWeb)),
        search: Arc::new(LeadSearch::new(SearchConfig::default()).unwrap()),
        scan_jobs: Arc::new(ScanJobStore::new(Duration::from_secs(60))),
    };
    (router(state), storage)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_analyze() {
    let (app, _) = app();

    let (status, body) = post(&app, "/api/scanner/analyze", json!({ "url": "kadernictvi.cz" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domain"], "kadernictvi.cz");
    assert_eq!(body["business_name"], "Kadeřnictví Jana");
    assert_eq!(body["ssl_valid"], true);
    assert_eq!(body["email"], "jana@kadernictvi.cz");
    assert!(body.get("load_time").is_some());

    let (status, body) = post(&app, "/api/scanner/analyze", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL je povinné");
}

#[tokio::test]
async fn test_bulk_analyze() {
    let (app, _) = app();

    let (status, body) = post(
        &app,
        "/api/scanner/bulk-analyze",
        json!({ "urls": ["kadernictvi.cz", "down.cz", "salon.cz"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].get("score").is_some());
    assert_eq!(results[1]["url"], "down.cz");
    assert!(results[1]["error"].is_string());
    assert!(results[2].get("score").is_some());

    let (status, body) = post(&app, "/api/scanner/bulk-analyze", json!({ "urls": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Zadejte pole URL adres");
}

#[tokio::test]
async fn test_save_and_conflict() {
    let (app, _) = app();
    let scan = json!({
        "business_name": "Kadeřnictví Jana",
        "url": "https://kadernictvi.cz/",
        "domain": "kadernictvi.cz",
        "email": "jana@kadernictvi.cz",
        "score": 45,
        "outdated_tech": ["Flash"]
    });

    let (status, body) = post(&app, "/api/scanner/save", scan.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["source"], "web_scan");
    assert_eq!(body["stage"], "new");
    let id = body["id"].as_i64().unwrap();

    let (status, body) = post(&app, "/api/scanner/save", scan).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["existing_id"], id);
    assert_eq!(body["error"], "Kontakt s touto doménou již existuje");
}

#[tokio::test]
async fn test_search_validation_and_unconfigured() {
    let (app, _) = app();

    let (status, body) = post(&app, "/api/scanner/search", json!({ "city": "Brno" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Zadejte vyhledávací dotaz");

    let (status, body) = post(&app, "/api/scanner/search", json!({ "query": "kadeřnictví" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "none");
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn test_scan_job_lifecycle() {
    let (app, _) = app();

    let (status, body) = post(
        &app,
        "/api/scanner/jobs",
        json!({ "urls": ["kadernictvi.cz", "down.cz"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();
    let uri = format!("/api/scanner/jobs/{}", job_id);

    let mut finished = None;
    for _ in 0..50 {
        let (status, body) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" {
            finished = Some(body);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let body = finished.expect("Scan job did not finish");
    assert_eq!(body["result"].as_array().unwrap().len(), 2);

    // Terminal state is handed out once
    let (status, _) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_enroll_and_cancel() {
    let (app, storage) = app();
    let sequence_id = {
        let mut guard = lock_storage(&storage).unwrap();
        for email in ["a@salon.cz", "b@salon.cz"] {
            guard
                .insert_contact(
                    &NewContact {
                        email: Some(email.to_string()),
                        category: Some("kadeřnictví".to_string()),
                        score: 60,
                        ..Default::default()
                    },
                    Utc::now(),
                )
                .unwrap();
        }
        let template = guard.insert_template("t", "s", "b").unwrap();
        let sequence_id = guard.insert_sequence("Salony", true).unwrap();
        guard
            .insert_sequence_step(sequence_id, 0, template, 0, None)
            .unwrap();
        sequence_id
    };
    let uri = format!("/api/sequences/{}/enroll", sequence_id);

    let (status, body) = post(
        &app,
        &uri,
        json!({ "filter": { "category": "kadeřnictví", "minScore": 50 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "enrolled": 2, "total": 2 }));

    let (_, body) = post(&app, &uri, json!({ "filter": { "stage": "new" } })).await;
    assert_eq!(body, json!({ "enrolled": 0, "total": 2 }));

    let enrollment_id = lock_storage(&storage)
        .unwrap()
        .list_enrollments(sequence_id)
        .unwrap()[0]
        .id;
    let (status, body) = post(
        &app,
        &format!("/api/sequences/enrollments/{}/cancel", enrollment_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
    let enrollment = lock_storage(&storage)
        .unwrap()
        .get_enrollment(enrollment_id)
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Cancelled);
}

#[tokio::test]
async fn test_enroll_inactive_sequence_is_bad_request() {
    let (app, storage) = app();
    let sequence_id = lock_storage(&storage)
        .unwrap()
        .insert_sequence("Vypnutá", false)
        .unwrap();

    let (status, body) = post(
        &app,
        &format!("/api/sequences/{}/enroll", sequence_id),
        json!({ "contact_ids": [1] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not found or inactive"));
}

#[tokio::test]
async fn test_tracking_pixel_records_open() {
    let (app, storage) = app();
    let (contact_id, campaign_id) = {
        let mut guard = lock_storage(&storage).unwrap();
        let contact_id = guard
            .insert_contact(
                &NewContact {
                    stage: Some(ContactStage::Contacted),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        let campaign_id = guard.insert_campaign("Jaro", CampaignStatus::Running).unwrap();
        guard
            .queue_email(
                &NewSentEmail {
                    campaign_id: Some(campaign_id),
                    contact_id,
                    template_id: None,
                    subject: "s".to_string(),
                    body_html: "b".to_string(),
                    to_email: "a@b.cz".to_string(),
                    tracking_id: "pixel-1".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        (contact_id, campaign_id)
    };

    for _ in 0..2 {
        let request = Request::builder()
            .uri("/api/track/open/pixel-1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-store, no-cache, must-revalidate"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), 42);
    }

    // Unknown IDs still get the pixel
    let request = Request::builder()
        .uri("/api/track/open/unknown")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let guard = lock_storage(&storage).unwrap();
    assert!(guard.contact_has_opened_email(contact_id).unwrap());
    assert_eq!(guard.get_campaign(campaign_id).unwrap().unwrap().total_opened, 1);
}
