use serde::Deserialize;

/// Main configuration structure for LeadScope
///
/// Every section is optional; a missing section falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Page fetch behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Per-attempt timeout for page fetches (seconds)
    #[serde(rename = "fetch-timeout-secs")]
    pub fetch_timeout_secs: u64,

    /// User-Agent header sent with page fetches
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 8,
            user_agent: "Mozilla/5.0 (compatible; LeadScope/1.0)".to_string(),
        }
    }
}

/// Search API used to discover candidate business websites
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Custom search endpoint
    pub endpoint: String,

    /// API key; search is disabled when absent
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,

    /// Search engine identifier; search is disabled when absent
    #[serde(rename = "engine-id")]
    pub engine_id: Option<String>,

    /// Country bias (`gl` parameter)
    pub country: String,

    /// Language restriction (`lr` parameter)
    pub language: String,

    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key: None,
            engine_id: None,
            country: "cz".to_string(),
            language: "lang_cs".to_string(),
            timeout_secs: 10,
        }
    }
}

impl SearchConfig {
    /// Returns the credentials pair when both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.engine_id.as_deref()) {
            (Some(key), Some(cx)) if !key.is_empty() && !cx.is_empty() => Some((key, cx)),
            _ => None,
        }
    }
}

/// Transactional email provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Provider send endpoint
    pub endpoint: String,

    /// Provider API key; a logging dev sender is used when absent
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,

    #[serde(rename = "sender-name")]
    pub sender_name: String,

    #[serde(rename = "sender-email")]
    pub sender_email: String,

    /// Company name available to templates as `firma_odesilatel`
    #[serde(rename = "sender-company")]
    pub sender_company: String,

    /// Public base URL of this service, used to build tracking pixel links
    #[serde(rename = "tracking-base-url")]
    pub tracking_base_url: String,

    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.resend.com/emails".to_string(),
            api_key: None,
            sender_name: "LeadScope".to_string(),
            sender_email: "info@leadscope.local".to_string(),
            sender_company: "LeadScope".to_string(),
            tracking_base_url: "http://localhost:3001".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Periodic job intervals
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    #[serde(rename = "email-queue-interval-secs")]
    pub email_queue_interval_secs: u64,

    /// Maximum queued emails handed to the sender per drain
    #[serde(rename = "email-batch-size")]
    pub email_batch_size: u32,

    #[serde(rename = "sequence-interval-secs")]
    pub sequence_interval_secs: u64,

    #[serde(rename = "campaign-interval-secs")]
    pub campaign_interval_secs: u64,

    /// How long a finished scan job is kept if nobody polls it
    #[serde(rename = "scan-job-ttl-secs")]
    pub scan_job_ttl_secs: u64,

    /// A claimed email still `sending` after this long goes back to the queue
    #[serde(rename = "claim-lease-secs")]
    pub claim_lease_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            email_queue_interval_secs: 30,
            email_batch_size: 3,
            sequence_interval_secs: 300,
            campaign_interval_secs: 60,
            scan_job_ttl_secs: 3600,
            claim_lease_secs: 120,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./leadscope.db".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
        }
    }
}
