use crate::mail::sender::{EmailSender, OutgoingEmail};
use crate::storage::{lock_storage, SentEmailRecord, SharedStorage, Storage};
use crate::LeadscopeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub email_id: i64,
    pub success: bool,

    /// The row was not queued (unknown, or another worker claimed it); nothing was sent
    pub skipped: bool,

    pub provider_id: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn sent(email_id: i64, provider_id: String) -> Self {
        Self {
            email_id,
            success: true,
            skipped: false,
            provider_id: Some(provider_id),
            error: None,
        }
    }

    pub fn failed(email_id: i64, error: impl Into<String>) -> Self {
        Self {
            email_id,
            success: false,
            skipped: false,
            provider_id: None,
            error: Some(error.into()),
        }
    }

    pub fn skipped(email_id: i64) -> Self {
        Self {
            email_id,
            success: false,
            skipped: true,
            provider_id: None,
            error: None,
        }
    }
}

/// Delivers queued email rows and records the outcome
///
/// A row is claimed (`queued` -> `sending`) before the provider is called,
/// so each row is delivered at most once no matter how many workers see it.
#[derive(Clone)]
pub struct MailDispatcher {
    storage: SharedStorage,
    sender: Arc<dyn EmailSender>,
}

impl MailDispatcher {
    pub fn new(storage: SharedStorage, sender: Arc<dyn EmailSender>) -> Self {
        Self { storage, sender }
    }

    /// Delivers one queued row
    ///
    /// Provider failures mark the row `failed` and are returned as data,
    /// never as an error.
    pub async fn send(&self, email_id: i64) -> SendOutcome {
        let email = match self.claim(email_id) {
            Ok(Some(email)) => email,
            Ok(None) => {
                debug!("Email {} is not queued; skipping", email_id);
                return SendOutcome::skipped(email_id);
            }
            Err(e) => {
                error!("Failed to claim email {}: {}", email_id, e);
                return SendOutcome::failed(email_id, e.to_string());
            }
        };

        let outgoing = OutgoingEmail {
            email_id,
            to: email.to_email.clone(),
            subject: email.subject.clone(),
            html: email.body_html.clone().unwrap_or_default(),
            tracking_id: email.tracking_id.clone(),
        };

        match self.sender.deliver(&outgoing).await {
            Ok(provider_id) => {
                if let Err(e) = self.record_sent(&email, &provider_id, Utc::now()) {
                    error!("Email {} was sent but bookkeeping failed: {}", email_id, e);
                }
                debug!("Email {} sent to {}", email_id, email.to_email);
                SendOutcome::sent(email_id, provider_id)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Email {} to {} failed: {}", email_id, email.to_email, message);
                if let Err(e) = self.record_failed(email_id, &message) {
                    error!("Failed to record failure of email {}: {}", email_id, e);
                }
                SendOutcome::failed(email_id, message)
            }
        }
    }

    fn claim(&self, email_id: i64) -> Result<Option<SentEmailRecord>, LeadscopeError> {
        let mut storage = lock_storage(&self.storage)?;
        let Some(email) = storage.get_sent_email(email_id)? else {
            return Ok(None);
        };
        if !storage.claim_email(email_id, Utc::now())? {
            return Ok(None);
        }
        Ok(Some(email))
    }

    fn record_sent(
        &self,
        email: &SentEmailRecord,
        provider_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), LeadscopeError> {
        let mut storage = lock_storage(&self.storage)?;

        storage.mark_email_sent(email.id, provider_id, at)?;
        if let Some(campaign_id) = email.campaign_id {
            storage.increment_campaign_sent(campaign_id)?;
        }

        let details =
            serde_json::json!({ "subject": email.subject, "to": email.to_email }).to_string();
        storage.record_activity(
            email.contact_id,
            "email_sent",
            "Email odeslán",
            Some(&details),
            at,
        )?;
        storage.touch_last_contacted(email.contact_id, at)?;
        Ok(())
    }

    fn record_failed(&self, email_id: i64, message: &str) -> Result<(), LeadscopeError> {
        let mut storage = lock_storage(&self.storage)?;
        storage.mark_email_failed(email_id, message)?;
        Ok(())
    }
}
