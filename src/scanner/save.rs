//! Saving a scan as a contact

use crate::scanner::analyzer::SiteScan;
use crate::storage::{ContactRecord, NewContact, Storage};
use crate::LeadscopeError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

/// A scan result plus the operator's additions, as posted to the save endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveScanRequest {
    pub business_name: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cms: Option<String>,
    pub cms_version: Option<String>,
    pub copyright_year: Option<i32>,
    #[serde(default)]
    pub ssl_valid: bool,
    #[serde(default)]
    pub mobile_friendly: bool,
    pub load_time: Option<f64>,
    #[serde(default)]
    pub outdated_tech: Vec<String>,
    #[serde(default)]
    pub score: u32,
    pub contact_name: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub notes: Option<String>,
}

impl From<&SiteScan> for SaveScanRequest {
    fn from(scan: &SiteScan) -> Self {
        Self {
            business_name: Some(scan.business_name.clone()),
            url: Some(scan.url.clone()),
            domain: Some(scan.domain.clone()),
            email: scan.email.clone(),
            phone: scan.phone.clone(),
            cms: scan.cms.clone(),
            cms_version: scan.cms_version.clone(),
            copyright_year: scan.copyright_year,
            ssl_valid: scan.ssl_valid,
            mobile_friendly: scan.mobile_friendly,
            load_time: Some(scan.load_time_seconds),
            outdated_tech: scan
                .outdated_tech
                .iter()
                .map(|issue| issue.label().to_string())
                .collect(),
            score: scan.score,
            ..Default::default()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Stores a scan as a new `web_scan` contact and logs a `created` activity
///
/// # Returns
///
/// * `Ok(ContactRecord)` - The stored contact
/// * `Err(LeadscopeError::DuplicateDomain)` - A contact already owns the domain
pub fn save_scan<S: Storage>(
    storage: &mut S,
    request: &SaveScanRequest,
    at: DateTime<Utc>,
) -> Result<ContactRecord, LeadscopeError> {
    let domain = non_empty(&request.domain);

    if let Some(domain) = &domain {
        if let Some(existing_id) = storage.find_contact_by_domain(domain)? {
            return Err(LeadscopeError::DuplicateDomain {
                domain: domain.clone(),
                existing_id,
            });
        }
    }

    let contact = NewContact {
        business_name: non_empty(&request.business_name),
        url: non_empty(&request.url),
        domain,
        email: non_empty(&request.email),
        phone: non_empty(&request.phone),
        contact_name: non_empty(&request.contact_name),
        category: non_empty(&request.category),
        city: non_empty(&request.city),
        source: "web_scan".to_string(),
        score: request.score,
        cms: non_empty(&request.cms),
        cms_version: non_empty(&request.cms_version),
        copyright_year: request.copyright_year,
        ssl_valid: request.ssl_valid,
        mobile_friendly: request.mobile_friendly,
        load_time: request.load_time,
        outdated_tech: request.outdated_tech.clone(),
        stage: None,
        notes: non_empty(&request.notes),
    };

    let contact_id = storage.insert_contact(&contact, at)?;

    let details = serde_json::json!({ "source": "web_scan", "url": request.url }).to_string();
    storage.record_activity(
        contact_id,
        "created",
        "Kontakt nalezen scannerem",
        Some(&details),
        at,
    )?;

    info!(
        "Saved scanned contact {} ({})",
        contact_id,
        contact.domain.as_deref().unwrap_or("-")
    );

    storage
        .get_contact(contact_id)?
        .ok_or_else(|| LeadscopeError::Storage(format!("contact {} vanished after insert", contact_id)))
}
