//! Website scanner
//!
//! This module turns a URL into a scored lead:
//! - `fetcher`: HTTPS-first page retrieval with load-time measurement
//! - `analyzer`: signal extraction, business name and score for one site
//! - `score`: the staleness scoring function
//! - `bulk`: concurrent, fault-isolated analysis of a batch of targets
//! - `search`: candidate discovery through a search provider
//! - `save`: storing a scan as a contact

mod analyzer;
mod bulk;
mod fetcher;
mod save;
mod score;
mod search;

pub use analyzer::{derive_business_name, ScanFailure, ScanResult, SiteAnalyzer, SiteScan};
pub use bulk::{analyze_bulk, analyze_bulk_with_progress, MAX_BULK_URLS};
pub use fetcher::{build_http_client, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use save::{save_scan, SaveScanRequest};
pub use score::{staleness_score, ScoreInputs, MAX_SCORE};
pub use search::{LeadSearch, SearchHit, SearchResponse};
