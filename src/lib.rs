//! LeadScope: website staleness scanner and outreach sequence engine
//!
//! This crate fetches business websites, extracts contact and technology
//! signals from the markup, scores how outdated each site looks, and drives
//! multi-step delayed email sequences for the resulting leads.

pub mod api;
pub mod config;
pub mod jobs;
pub mod mail;
pub mod scanner;
pub mod sequence;
pub mod signals;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for LeadScope operations
#[derive(Debug, Error)]
pub enum LeadscopeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] sequence::SequenceError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Contact with domain {domain} already exists (id {existing_id})")]
    DuplicateDomain { domain: String, existing_id: i64 },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Mail queue closed")]
    MailQueueClosed,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Empty URL")]
    Empty,
}

/// Result type alias for LeadScope operations
pub type Result<T> = std::result::Result<T, LeadscopeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use scanner::{ScanResult, SiteAnalyzer, SiteScan};
pub use state::{ContactStage, EnrollmentStatus};
pub use url::{extract_domain, normalize_target};
