//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{CampaignStatus, ContactStage, EnrollmentStatus};
use crate::storage::{
    ActivityRecord, CampaignRecord, ContactFilter, ContactRecord, EnrollmentRecord, NewContact,
    NewSentEmail, SentEmailRecord, SequenceRecord, SequenceStepRecord, StepCondition, StepDispatch,
    TemplateRecord,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Contact not found: {0}")]
    ContactNotFound(i64),

    #[error("Sent email not found: {0}")]
    SentEmailNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the scanner, the
/// mail pipeline and the sequence engine. Methods that write a timestamp
/// take it as an argument so callers control the clock.
pub trait Storage {
    // ===== Contacts =====

    /// Inserts a new contact
    ///
    /// # Returns
    ///
    /// The ID of the newly created contact
    fn insert_contact(&mut self, contact: &NewContact, at: DateTime<Utc>) -> StorageResult<i64>;

    /// Gets a contact by ID
    fn get_contact(&self, contact_id: i64) -> StorageResult<Option<ContactRecord>>;

    /// Finds the contact that owns a domain
    fn find_contact_by_domain(&self, domain: &str) -> StorageResult<Option<i64>>;

    /// Returns IDs of contacts with an email address that match every set filter field
    fn find_contact_ids(&self, filter: &ContactFilter) -> StorageResult<Vec<i64>>;

    /// Sets a contact's pipeline stage
    fn update_contact_stage(
        &mut self,
        contact_id: i64,
        stage: ContactStage,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Stamps `last_contacted_at`
    fn touch_last_contacted(&mut self, contact_id: i64, at: DateTime<Utc>) -> StorageResult<()>;

    // ===== Activities =====

    /// Appends an entry to a contact's activity log
    fn record_activity(
        &mut self,
        contact_id: i64,
        kind: &str,
        title: &str,
        details: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<i64>;

    /// Lists a contact's activity log, oldest first
    fn list_activities(&self, contact_id: i64) -> StorageResult<Vec<ActivityRecord>>;

    // ===== Templates =====

    /// Inserts an email template
    fn insert_template(&mut self, name: &str, subject: &str, body_html: &str)
        -> StorageResult<i64>;

    /// Gets a template by ID
    fn get_template(&self, template_id: i64) -> StorageResult<Option<TemplateRecord>>;

    // ===== Campaigns =====

    /// Inserts a campaign
    fn insert_campaign(&mut self, name: &str, status: CampaignStatus) -> StorageResult<i64>;

    /// Gets a campaign by ID
    fn get_campaign(&self, campaign_id: i64) -> StorageResult<Option<CampaignRecord>>;

    /// Lists campaigns in a given status
    fn list_campaigns_by_status(&self, status: CampaignStatus)
        -> StorageResult<Vec<CampaignRecord>>;

    /// Counts a campaign's emails that are still queued or in flight
    fn count_pending_campaign_emails(&self, campaign_id: i64) -> StorageResult<u64>;

    /// Marks a running campaign as completed
    ///
    /// Returns false if the campaign was not running.
    fn complete_campaign(&mut self, campaign_id: i64, at: DateTime<Utc>) -> StorageResult<bool>;

    /// Increments the campaign's sent counter
    fn increment_campaign_sent(&mut self, campaign_id: i64) -> StorageResult<()>;

    /// Increments the campaign's opened counter
    fn increment_campaign_opened(&mut self, campaign_id: i64) -> StorageResult<()>;

    // ===== Outbound Emails =====

    /// Queues an outbound email
    fn queue_email(&mut self, email: &NewSentEmail, at: DateTime<Utc>) -> StorageResult<i64>;

    /// Gets an outbound email by ID
    fn get_sent_email(&self, email_id: i64) -> StorageResult<Option<SentEmailRecord>>;

    /// Gets an outbound email by its tracking ID
    fn get_sent_email_by_tracking(&self, tracking_id: &str)
        -> StorageResult<Option<SentEmailRecord>>;

    /// Returns up to `limit` queued email IDs, oldest first
    fn list_queued_email_ids(&self, limit: u32) -> StorageResult<Vec<i64>>;

    /// Claims a queued email for delivery (`queued` -> `sending`)
    ///
    /// Returns false if the email was not queued, meaning another worker
    /// already owns it.
    fn claim_email(&mut self, email_id: i64, at: DateTime<Utc>) -> StorageResult<bool>;

    /// Returns `sending` rows claimed before `claimed_before` to the queue
    ///
    /// Recovers rows whose worker died between claim and outcome. Returns
    /// the number of rows released.
    fn release_stale_claims(&mut self, claimed_before: DateTime<Utc>) -> StorageResult<usize>;

    /// Marks a claimed email as delivered
    fn mark_email_sent(
        &mut self,
        email_id: i64,
        provider_id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Marks a claimed email as failed with the provider's error
    fn mark_email_failed(&mut self, email_id: i64, error: &str) -> StorageResult<()>;

    /// Stamps the first open of an email
    ///
    /// Returns false if it was already opened.
    fn mark_email_opened(&mut self, email_id: i64, at: DateTime<Utc>) -> StorageResult<bool>;

    /// Returns true if any email to the contact has been opened
    fn contact_has_opened_email(&self, contact_id: i64) -> StorageResult<bool>;

    /// Lists all emails sent to a contact, oldest first
    fn list_emails_for_contact(&self, contact_id: i64) -> StorageResult<Vec<SentEmailRecord>>;

    // ===== Sequences =====

    /// Inserts a sequence
    fn insert_sequence(&mut self, name: &str, is_active: bool) -> StorageResult<i64>;

    /// Gets a sequence by ID
    fn get_sequence(&self, sequence_id: i64) -> StorageResult<Option<SequenceRecord>>;

    /// Activates or deactivates a sequence
    fn set_sequence_active(&mut self, sequence_id: i64, is_active: bool) -> StorageResult<()>;

    /// Appends a step to a sequence
    fn insert_sequence_step(
        &mut self,
        sequence_id: i64,
        step_order: u32,
        template_id: i64,
        delay_days: u32,
        condition: Option<StepCondition>,
    ) -> StorageResult<i64>;

    /// Gets a sequence's steps ordered by `step_order`
    fn get_sequence_steps(&self, sequence_id: i64) -> StorageResult<Vec<SequenceStepRecord>>;

    // ===== Enrollments =====

    /// Finds the active enrollment of a contact in a sequence
    fn find_active_enrollment(
        &self,
        sequence_id: i64,
        contact_id: i64,
    ) -> StorageResult<Option<i64>>;

    /// Inserts an active enrollment at step 0
    fn insert_enrollment(
        &mut self,
        sequence_id: i64,
        contact_id: i64,
        next_send_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StorageResult<i64>;

    /// Gets an enrollment by ID
    fn get_enrollment(&self, enrollment_id: i64) -> StorageResult<Option<EnrollmentRecord>>;

    /// Lists a sequence's enrollments
    fn list_enrollments(&self, sequence_id: i64) -> StorageResult<Vec<EnrollmentRecord>>;

    /// Returns active enrollments due at `now` whose sequence is active
    fn due_enrollments(&self, now: DateTime<Utc>) -> StorageResult<Vec<EnrollmentRecord>>;

    /// Moves an active enrollment to a terminal status
    ///
    /// Returns false if the enrollment was not active.
    fn finish_enrollment(
        &mut self,
        enrollment_id: i64,
        status: EnrollmentStatus,
    ) -> StorageResult<bool>;

    /// Applies a step dispatch in one transaction
    ///
    /// The enrollment advance is guarded on `status = active` and
    /// `current_step = expected_step`. When the guard fails nothing is
    /// written and `None` is returned; otherwise the email is queued, the
    /// contact promoted if requested, and the new email ID returned.
    fn dispatch_step(&mut self, dispatch: &StepDispatch) -> StorageResult<Option<i64>>;
}
