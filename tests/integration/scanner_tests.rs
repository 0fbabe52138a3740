//! Scanner tests against mock websites

use leadscope::config::{ScannerConfig, SearchConfig};
use leadscope::scanner::{analyze_bulk, HttpFetcher, LeadSearch, ScanResult, SiteAnalyzer};
use leadscope::signals::TechIssue;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STALE_PAGE: &str = r#"<html><head>
    <title>Truhlářství Novák | Úvod</title>
    <script src="/js/jquery-1.8.3.min.js"></script>
    </head><body>
    <p>Kontakt: <a href="mailto:info@truhlarstvi-novak.cz">info@truhlarstvi-novak.cz</a></p>
    <p>Tel.: +420 603 123 456</p>
    <p>© 2016 Truhlářství Novák</p>
    </body></html>"#;

fn analyzer() -> SiteAnalyzer {
    let config = ScannerConfig {
        fetch_timeout_secs: 5,
        ..Default::default()
    };
    SiteAnalyzer::new(Arc::new(
        HttpFetcher::new(&config).expect("Failed to build fetcher"),
    ))
}

async fn stale_site() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(STALE_PAGE)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;
    mock_server
}

#[tokio::test]
async fn test_http_fallback_scan() {
    let mock_server = stale_site().await;

    // The mock server only speaks plain HTTP, so the HTTPS attempt fails
    let result = analyzer().analyze_in_year(&mock_server.uri(), 2024).await;

    let scan = result.scan().expect("Expected a complete scan");
    assert!(!scan.ssl_valid);
    assert!(!scan.mobile_friendly);
    assert_eq!(scan.copyright_year, Some(2016));
    assert_eq!(scan.business_name, "Truhlářství Novák");
    assert_eq!(scan.email.as_deref(), Some("info@truhlarstvi-novak.cz"));
    assert_eq!(scan.phone.as_deref(), Some("+420603123456"));
    assert!(scan.outdated_tech.contains(&TechIssue::JQuery1));
    assert!(scan.outdated_tech.contains(&TechIssue::MissingViewport));
    // 25 (no https) + 25 (not mobile) + 20 (stale) + 20 (two issues), clamped
    assert_eq!(scan.score, 90);
}

#[tokio::test]
async fn test_error_status_is_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let result = analyzer().analyze(&mock_server.uri()).await;

    assert!(!result.is_complete());
    assert!(result.error().is_some());
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json.as_object().unwrap().len(), 2);
    assert_eq!(json["url"], mock_server.uri());
}

#[tokio::test]
async fn test_bulk_isolates_unreachable_target() {
    let mock_server = stale_site().await;
    let urls = vec![
        mock_server.uri(),
        "http://127.0.0.1:1/".to_string(),
        format!("{}/", mock_server.uri()),
    ];

    let results = analyze_bulk(&analyzer(), &urls).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_complete());
    assert!(matches!(&results[1], ScanResult::Failed(f) if f.url == "http://127.0.0.1:1/"));
    assert!(results[2].is_complete());
}

fn search_config(endpoint: String) -> SearchConfig {
    SearchConfig {
        endpoint,
        api_key: Some("test-key".to_string()),
        engine_id: Some("test-cx".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_search_provider_results() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("q", "truhlářství Brno"))
        .and(query_param("key", "test-key"))
        .and(query_param("cx", "test-cx"))
        .and(query_param("num", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                {
                    "title": "Truhlářství Novák",
                    "link": "https://www.truhlarstvi-novak.cz/o-nas",
                    "snippet": "Nábytek na míru"
                }
            ]
        })))
        .mount(&mock_server)
        .await;

    let search = LeadSearch::new(search_config(format!("{}/customsearch/v1", mock_server.uri())))
        .expect("Failed to build search client");
    let response = search.search("truhlářství", Some("Brno")).await;

    assert_eq!(response.source, "google");
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].domain, "truhlarstvi-novak.cz");
    assert_eq!(response.results[0].snippet, "Nábytek na míru");
}

#[tokio::test]
async fn test_search_provider_error_degrades() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
        .mount(&mock_server)
        .await;

    let search = LeadSearch::new(search_config(mock_server.uri())).unwrap();
    let response = search.search("pekárna", None).await;

    assert_eq!(response.source, "none");
    assert!(response.results.is_empty());
    assert!(response.message.is_some());
}

#[tokio::test]
async fn test_search_without_credentials() {
    let search = LeadSearch::new(SearchConfig::default()).unwrap();
    let response = search.search("pekárna", Some("Olomouc")).await;

    assert_eq!(response.source, "none");
    assert!(response.message.unwrap().contains("GOOGLE_API_KEY"));
}
