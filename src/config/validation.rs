use crate::config::types::{
    Config, MailConfig, ScannerConfig, SchedulerConfig, SearchConfig, ServerConfig, StorageConfig,
};
use crate::ConfigError;
use std::net::SocketAddr;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scanner_config(&config.scanner)?;
    validate_search_config(&config.search)?;
    validate_mail_config(&config.mail)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_storage_config(&config.storage)?;
    validate_server_config(&config.server)?;

    if config.scheduler.claim_lease_secs <= config.mail.timeout_secs {
        return Err(ConfigError::Validation(format!(
            "claim_lease_secs ({}) must exceed mail timeout_secs ({})",
            config.scheduler.claim_lease_secs, config.mail.timeout_secs
        )));
    }
    Ok(())
}

fn validate_scanner_config(config: &ScannerConfig) -> Result<(), ConfigError> {
    if config.fetch_timeout_secs == 0 || config.fetch_timeout_secs > 120 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_secs must be between 1 and 120, got {}",
            config.fetch_timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    validate_http_url("search endpoint", &config.endpoint)?;

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "search timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_mail_config(config: &MailConfig) -> Result<(), ConfigError> {
    validate_http_url("mail endpoint", &config.endpoint)?;
    validate_http_url("tracking_base_url", &config.tracking_base_url)?;
    validate_email(&config.sender_email)?;

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "mail timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    let intervals = [
        ("email_queue_interval_secs", config.email_queue_interval_secs),
        ("sequence_interval_secs", config.sequence_interval_secs),
        ("campaign_interval_secs", config.campaign_interval_secs),
        ("scan_job_ttl_secs", config.scan_job_ttl_secs),
        ("claim_lease_secs", config.claim_lease_secs),
    ];

    for (name, value) in intervals {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be >= 1", name)));
        }
    }

    if config.email_batch_size == 0 || config.email_batch_size > 100 {
        return Err(ConfigError::Validation(format!(
            "email_batch_size must be between 1 and 100, got {}",
            config.email_batch_size
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    config.bind.parse::<SocketAddr>().map_err(|e| {
        ConfigError::Validation(format!("Invalid bind address '{}': {}", config.bind, e))
    })?;
    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "sender_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let mut config = Config::default();
        config.scheduler.sequence_interval_secs = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_zero_claim_lease() {
        let mut config = Config::default();
        config.scheduler.claim_lease_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_claim_lease_must_outlast_mail_timeout() {
        let mut config = Config::default();
        config.mail.timeout_secs = 30;
        config.scheduler.claim_lease_secs = 30;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.scheduler.claim_lease_secs = 61;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_bad_batch_size() {
        let mut config = Config::default();
        config.scheduler.email_batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.mail.endpoint = "ftp://mail.example.org".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_rejects_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "localhost".to_string();
        assert!(validate(&config).is_err());
    }
}
