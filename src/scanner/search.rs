//! Lead search adapter
//!
//! Thin client for a Google Custom Search compatible endpoint, used to
//! discover candidate business websites. Missing credentials and provider
//! errors are not failures: both produce an empty result with a message.

use crate::config::SearchConfig;
use crate::url::domain_of;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const RESULTS_PER_QUERY: &str = "10";

const NOT_CONFIGURED_MESSAGE: &str = "Pro vyhledávání nastavte GOOGLE_API_KEY a GOOGLE_CX v prostředí. \
     Alternativně můžete zadat URL adresy přímo do skeneru.";

/// One candidate website
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub domain: String,
    pub snippet: String,
}

/// Search outcome as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,

    /// `google` when the provider answered, `none` otherwise
    pub source: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchResponse {
    fn unavailable() -> Self {
        Self {
            results: Vec::new(),
            source: "none",
            message: Some(NOT_CONFIGURED_MESSAGE.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    items: Option<Vec<ProviderItem>>,
}

#[derive(Debug, Deserialize)]
struct ProviderItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Client for the search provider
pub struct LeadSearch {
    client: Client,
    config: SearchConfig,
}

impl LeadSearch {
    pub fn new(config: SearchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Searches for businesses matching `query`, optionally narrowed to a city
    pub async fn search(&self, query: &str, city: Option<&str>) -> SearchResponse {
        let Some((api_key, engine_id)) = self.config.credentials() else {
            debug!("Search requested without provider credentials");
            return SearchResponse::unavailable();
        };

        let full_query = match city.map(str::trim).filter(|c| !c.is_empty()) {
            Some(city) => format!("{} {}", query, city),
            None => query.to_string(),
        };

        match self.query_provider(api_key, engine_id, &full_query).await {
            Ok(Some(results)) => SearchResponse {
                results,
                source: "google",
                message: None,
            },
            Ok(None) => SearchResponse::unavailable(),
            Err(e) => {
                warn!("Search provider error: {}", e);
                SearchResponse::unavailable()
            }
        }
    }

    /// Returns `None` when the provider answered without an `items` list
    async fn query_provider(
        &self,
        api_key: &str,
        engine_id: &str,
        query: &str,
    ) -> Result<Option<Vec<SearchHit>>, reqwest::Error> {
        let response: ProviderResponse = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("key", api_key),
                ("cx", engine_id),
                ("q", query),
                ("num", RESULTS_PER_QUERY),
                ("gl", self.config.country.as_str()),
                ("lr", self.config.language.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.items.map(|items| {
            items
                .into_iter()
                .map(|item| SearchHit {
                    domain: domain_of(&item.link).unwrap_or_default(),
                    title: item.title,
                    url: item.link,
                    snippet: item.snippet,
                })
                .collect()
        }))
    }
}
