//! Page fetcher
//!
//! This module handles retrieval of one target page:
//! - Building the HTTP client with the configured user agent and timeout
//! - HTTPS first, one plain HTTP retry on any failure
//! - Wall-clock load time across both attempts

use crate::config::ScannerConfig;
use crate::url::with_scheme;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,

    /// Page body
    pub body: String,

    /// True when the successful attempt used HTTPS
    ///
    /// This is reachability over HTTPS. Certificate validity is only implied
    /// by the TLS stack accepting the connection.
    pub via_https: bool,

    /// Time from the first attempt until the body was read
    pub elapsed: Duration,
}

/// Both fetch attempts failed
#[derive(Debug, Clone, Error)]
#[error("Nepodařilo se načíst {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

/// Retrieves one page for analysis
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, target: &Url) -> Result<FetchedPage, FetchError>;
}

/// Builds the HTTP client used for page fetches
///
/// # Arguments
///
/// * `config` - Scanner configuration (timeout, user agent)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ScannerConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.fetch_timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by reqwest
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ScannerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Single GET; non-2xx statuses count as failures
    async fn attempt(&self, url: &Url) -> Result<(String, String), reqwest::Error> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok((final_url, body))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Fetches a target with the HTTPS-first policy
    ///
    /// # Fetch Flow
    ///
    /// 1. GET the `https://` form of the target
    /// 2. On any failure (DNS, TLS, timeout, non-2xx), GET the `http://` form once
    /// 3. If both fail, report the second error
    async fn fetch(&self, target: &Url) -> Result<FetchedPage, FetchError> {
        let started = Instant::now();

        let https_url = with_scheme(target, "https");
        let https_error = match self.attempt(&https_url).await {
            Ok((final_url, body)) => {
                return Ok(FetchedPage {
                    final_url,
                    body,
                    via_https: true,
                    elapsed: started.elapsed(),
                })
            }
            Err(e) => e,
        };
        debug!("HTTPS fetch of {} failed: {}", https_url, https_error);

        let http_url = with_scheme(target, "http");
        match self.attempt(&http_url).await {
            Ok((final_url, body)) => Ok(FetchedPage {
                final_url,
                body,
                via_https: false,
                elapsed: started.elapsed(),
            }),
            Err(e) => {
                debug!("HTTP fallback for {} failed: {}", http_url, e);
                Err(FetchError {
                    url: target.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}
