//! Site analyzer
//!
//! Orchestrates one analysis: normalize the target, fetch it, run every
//! signal extractor over the body, derive a business name and score the
//! result. A fetch failure yields [`ScanResult::Failed`] with no partial
//! signals.

use crate::scanner::fetcher::PageFetcher;
use crate::scanner::score::{staleness_score, ScoreInputs};
use crate::signals::{extract_signals, TechIssue};
use crate::url::{extract_domain, normalize_target};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Title fragments that never name a business
const GENERIC_TITLES: &[&str] = &[
    "úvodní stránka",
    "homepage",
    "home",
    "hlavní stránka",
    "vítejte",
    "welcome",
];

const TITLE_SEPARATORS: &[char] = &['-', '–', '|', '»'];

/// A complete scan of one site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteScan {
    /// Final URL after redirects
    pub url: String,
    pub domain: String,
    pub business_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub all_emails: Vec<String>,
    pub all_phones: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub cms: Option<String>,
    pub cms_version: Option<String>,
    pub copyright_year: Option<i32>,
    /// The page was reachable over HTTPS
    pub ssl_valid: bool,
    pub mobile_friendly: bool,
    /// Seconds, rounded to two decimals
    #[serde(rename = "load_time")]
    pub load_time_seconds: f64,
    pub outdated_tech: Vec<TechIssue>,
    pub score: u32,
}

/// A scan that could not be performed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanFailure {
    /// The target as supplied by the caller
    pub url: String,
    pub error: String,
}

/// Outcome of analyzing one URL
///
/// Serializes untagged: either the scan's fields or `{url, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScanResult {
    Complete(SiteScan),
    Failed(ScanFailure),
}

impl ScanResult {
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failed(ScanFailure {
            url: url.into(),
            error: error.into(),
        })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub fn scan(&self) -> Option<&SiteScan> {
        match self {
            Self::Complete(scan) => Some(scan),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Failed(failure) => Some(&failure.error),
        }
    }
}

/// Analyzes single sites through a [`PageFetcher`]
#[derive(Clone)]
pub struct SiteAnalyzer {
    fetcher: Arc<dyn PageFetcher>,
}

impl SiteAnalyzer {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Analyzes one target, scoring copyright staleness against the current year
    pub async fn analyze(&self, input: &str) -> ScanResult {
        self.analyze_in_year(input, Utc::now().year()).await
    }

    /// Analyzes one target, scoring copyright staleness against `current_year`
    ///
    /// # Analysis Steps
    ///
    /// 1. Normalize the target and derive its domain (without `www.`)
    /// 2. Fetch the page; on failure return `Failed` immediately
    /// 3. Run all signal extractors over the body
    /// 4. Derive the business name
    /// 5. Compute the staleness score
    pub async fn analyze_in_year(&self, input: &str, current_year: i32) -> ScanResult {
        let target = match normalize_target(input) {
            Ok(target) => target,
            Err(e) => {
                warn!("Rejected scan target {:?}: {}", input, e);
                return ScanResult::failed(input, e.to_string());
            }
        };

        let Some(domain) = extract_domain(&target) else {
            return ScanResult::failed(input, "Missing domain in URL");
        };

        let page = match self.fetcher.fetch(&target).await {
            Ok(page) => page,
            Err(e) => {
                warn!("{}", e);
                return ScanResult::failed(input, e.to_string());
            }
        };

        let load_time = page.elapsed.as_secs_f64();
        let signals = extract_signals(&page.body);

        let score = staleness_score(
            &ScoreInputs {
                ssl_valid: page.via_https,
                mobile_friendly: signals.mobile_friendly,
                copyright_year: signals.copyright_year,
                outdated_issue_count: signals.outdated_tech.len(),
                load_time_seconds: load_time,
            },
            current_year,
        );

        let business_name = derive_business_name(
            signals.site_name.as_deref(),
            signals.title.as_deref(),
            &domain,
        );

        debug!(
            "Scanned {}: {} emails, {} phones, {} issues",
            domain,
            signals.emails.len(),
            signals.phones.len(),
            signals.outdated_tech.len()
        );
        info!("Scored {} at {} ({:.2}s)", domain, score, load_time);

        let (cms, cms_version) = match signals.cms {
            Some(m) => (Some(m.name.to_string()), m.version),
            None => (None, None),
        };

        ScanResult::Complete(SiteScan {
            url: page.final_url,
            domain,
            business_name,
            email: signals.emails.first().cloned(),
            phone: signals.phones.first().cloned(),
            all_emails: signals.emails,
            all_phones: signals.phones,
            title: signals.title,
            description: signals.description,
            cms,
            cms_version,
            copyright_year: signals.copyright_year,
            ssl_valid: page.via_https,
            mobile_friendly: signals.mobile_friendly,
            load_time_seconds: (load_time * 100.0).round() / 100.0,
            outdated_tech: signals.outdated_tech,
            score,
        })
    }
}

/// Picks a business name for a scanned site
///
/// Priority: `og:site_name`, then the first non-generic title segment
/// (falling back to the first segment), then the bare domain.
pub fn derive_business_name(site_name: Option<&str>, title: Option<&str>, domain: &str) -> String {
    if let Some(name) = site_name.map(str::trim).filter(|s| !s.is_empty()) {
        return name.to_string();
    }

    let parts: Vec<&str> = title
        .unwrap_or_default()
        .split(TITLE_SEPARATORS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    parts
        .iter()
        .find(|part| !GENERIC_TITLES.contains(&part.to_lowercase().as_str()))
        .or_else(|| parts.first())
        .map(|part| part.to_string())
        .unwrap_or_else(|| domain.to_string())
}
