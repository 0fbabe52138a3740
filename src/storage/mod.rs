//! Storage module for persisting leads and outreach state
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Contact records and their activity log
//! - Email templates, campaigns and the outbound email queue
//! - Sequences, their ordered steps and per-contact enrollments
//!
//! All timestamps are stored as RFC 3339 UTC strings with millisecond
//! precision, so string comparison in SQL matches chronological order.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{CampaignStatus, ContactStage, EnrollmentStatus, SentEmailStatus};
use crate::LeadscopeError;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the API, the scheduler and background jobs
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(LeadscopeError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, LeadscopeError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing across tasks
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, mapping a poisoned mutex to an error
///
/// The guard must never be held across an `.await`.
pub fn lock_storage(storage: &SharedStorage) -> Result<MutexGuard<'_, SqliteStorage>, LeadscopeError> {
    storage
        .lock()
        .map_err(|e| LeadscopeError::Storage(format!("storage lock poisoned: {}", e)))
}

/// Formats a timestamp the way it is stored in the database
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A contact (lead) row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRecord {
    pub id: i64,
    pub business_name: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact_name: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub source: String,
    pub score: u32,
    pub cms: Option<String>,
    pub cms_version: Option<String>,
    pub copyright_year: Option<i32>,
    pub ssl_valid: bool,
    pub mobile_friendly: bool,
    pub load_time: Option<f64>,
    pub outdated_tech: Vec<String>,
    pub stage: ContactStage,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_contacted_at: Option<String>,
}

/// Values for inserting a new contact
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
    pub business_name: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact_name: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub score: u32,
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
    pub stage: Option<ContactStage>,
    pub notes: Option<String>,
}

fn default_source() -> String {
    "manual".to_string()
}

/// Selects contacts for bulk enrollment
///
/// Contacts without an email address never match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContactFilter {
    pub stage: Option<ContactStage>,
    pub category: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "minScore")]
    pub min_score: Option<u32>,
}

/// One entry of a contact's activity log
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub contact_id: i64,
    pub kind: String,
    pub title: String,
    pub details: Option<String>,
    pub created_at: String,
}

/// An email template row
#[derive(Debug, Clone)]
pub struct TemplateRecord {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub body_html: String,
}

/// A bulk campaign row
#[derive(Debug, Clone)]
pub struct CampaignRecord {
    pub id: i64,
    pub name: String,
    pub status: CampaignStatus,
    pub total_sent: u32,
    pub total_opened: u32,
    pub completed_at: Option<String>,
}

/// An outbound email row
#[derive(Debug, Clone)]
pub struct SentEmailRecord {
    pub id: i64,
    pub campaign_id: Option<i64>,
    pub contact_id: i64,
    pub template_id: Option<i64>,
    pub subject: String,
    pub body_html: Option<String>,
    pub to_email: String,
    pub status: SentEmailStatus,
    pub tracking_id: String,
    pub opened_at: Option<String>,
    pub provider_id: Option<String>,
    pub error: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
}

/// Values for queuing a new outbound email
#[derive(Debug, Clone)]
pub struct NewSentEmail {
    pub campaign_id: Option<i64>,
    pub contact_id: i64,
    pub template_id: Option<i64>,
    pub subject: String,
    pub body_html: String,
    pub to_email: String,
    pub tracking_id: String,
}

/// A sequence row
#[derive(Debug, Clone, Serialize)]
pub struct SequenceRecord {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

/// Per-step stop conditions, stored as JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCondition {
    #[serde(default)]
    pub skip_if_replied: bool,
    #[serde(default)]
    pub skip_if_opened: bool,
}

/// One step of a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceStepRecord {
    pub id: i64,
    pub sequence_id: i64,
    pub step_order: u32,
    pub template_id: i64,
    pub delay_days: u32,
    pub condition: Option<StepCondition>,
}

/// One contact's progress through one sequence
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentRecord {
    pub id: i64,
    pub sequence_id: i64,
    pub contact_id: i64,
    pub current_step: u32,
    pub status: EnrollmentStatus,
    pub enrolled_at: String,
    pub next_send_at: Option<String>,
}

/// Everything written when a sequence step is handed to the mail queue
#[derive(Debug, Clone)]
pub struct StepDispatch {
    pub enrollment_id: i64,

    /// Step index the enrollment must still be on
    pub expected_step: u32,

    /// When the following step is due; `None` completes the enrollment
    pub next_send_at: Option<DateTime<Utc>>,

    pub email: NewSentEmail,

    /// Promote the contact from `new` to `contacted`
    pub promote_contact: bool,

    pub at: DateTime<Utc>,
}
