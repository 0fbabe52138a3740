//! Email-send collaborators
//!
//! - `ResendSender`: POSTs to a transactional email provider with bearer
//!   auth, injecting an open-tracking pixel
//! - `LogSender`: development stand-in that only logs

use crate::config::MailConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// A message ready for delivery
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub email_id: i64,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub tracking_id: String,
}

/// Delivery failures reported by a sender
#[derive(Debug, Error)]
pub enum SendError {
    #[error("{0}")]
    Provider(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Hands one message to a delivery provider
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Delivers a message and returns the provider's message ID
    async fn deliver(&self, email: &OutgoingEmail) -> Result<String, SendError>;
}

/// Builds the sender the mail configuration asks for
///
/// A configured API key selects the provider sender; otherwise messages are
/// only logged.
pub fn sender_from_config(config: &MailConfig) -> Result<Box<dyn EmailSender>, reqwest::Error> {
    match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(api_key) => Ok(Box::new(ResendSender::new(config, api_key)?)),
        None => Ok(Box::new(LogSender)),
    }
}

/// Appends the 1x1 open-tracking image to an HTML body
pub fn with_tracking_pixel(html: &str, base_url: &str, tracking_id: &str) -> String {
    format!(
        r#"{}<img src="{}/api/track/open/{}" width="1" height="1" style="display:none" />"#,
        html,
        base_url.trim_end_matches('/'),
        tracking_id
    )
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ProviderReply {
    id: Option<String>,
    message: Option<String>,
}

/// Sender for a Resend-compatible HTTP API
pub struct ResendSender {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
    tracking_base_url: String,
}

impl ResendSender {
    pub fn new(config: &MailConfig, api_key: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: api_key.to_string(),
            from: format!("{} <{}>", config.sender_name, config.sender_email),
            tracking_base_url: config.tracking_base_url.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for ResendSender {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<String, SendError> {
        let body = if email.html.is_empty() {
            &email.subject
        } else {
            &email.html
        };
        let html = with_tracking_pixel(body, &self.tracking_base_url, &email.tracking_id);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ProviderRequest {
                from: &self.from,
                to: [email.to.as_str()],
                subject: &email.subject,
                html: &html,
            })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let reply: Option<ProviderReply> = serde_json::from_str(&text).ok();

        if status.is_success() {
            return Ok(reply.and_then(|r| r.id).unwrap_or_default());
        }

        let message = reply
            .and_then(|r| r.message)
            .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), text));
        Err(SendError::Provider(message))
    }
}

/// Development sender: logs the message and reports success
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<String, SendError> {
        info!("[DEV] Would send email to {}: {:?}", email.to, email.subject);
        Ok(format!("dev-{}", email.email_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outgoing() -> OutgoingEmail {
        OutgoingEmail {
            email_id: 7,
            to: "info@firma.cz".to_string(),
            subject: "Nabídka".to_string(),
            html: "<p>Ahoj</p>".to_string(),
            tracking_id: "abc-123".to_string(),
        }
    }

    #[test]
    fn test_with_tracking_pixel() {
        let html = with_tracking_pixel("<p>Ahoj</p>", "https://crm.firma.cz/", "abc");
        assert_eq!(
            html,
            r#"<p>Ahoj</p><img src="https://crm.firma.cz/api/track/open/abc" width="1" height="1" style="display:none" />"#
        );
    }

    #[tokio::test]
    async fn test_log_sender_reports_dev_id() {
        let id = LogSender.deliver(&outgoing()).await.unwrap();
        assert_eq!(id, "dev-7");
    }

    #[test]
    fn test_sender_from_config_without_key_is_log_sender() {
        let config = MailConfig::default();
        assert!(sender_from_config(&config).is_ok());
    }
}
