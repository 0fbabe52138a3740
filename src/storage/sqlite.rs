//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{CampaignStatus, ContactStage, EnrollmentStatus, SentEmailStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, ActivityRecord, CampaignRecord, ContactFilter, ContactRecord,
    EnrollmentRecord, NewContact, NewSentEmail, SentEmailRecord, SequenceRecord,
    SequenceStepRecord, StepCondition, StepDispatch, TemplateRecord,
};
use crate::LeadscopeError;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const CONTACT_COLUMNS: &str = "id, business_name, url, domain, email, phone, contact_name, \
     category, city, source, score, cms, cms_version, copyright_year, ssl_valid, \
     mobile_friendly, load_time, outdated_tech, stage, notes, created_at, updated_at, \
     last_contacted_at";

const SENT_EMAIL_COLUMNS: &str = "id, campaign_id, contact_id, template_id, subject, body_html, \
     to_email, status, tracking_id, opened_at, provider_id, error, sent_at, created_at";

const ENROLLMENT_COLUMNS: &str =
    "id, sequence_id, contact_id, current_step, status, enrolled_at, next_send_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(LeadscopeError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, LeadscopeError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, LeadscopeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<ContactRecord> {
    let outdated_tech: String = row.get(17)?;
    let stage: String = row.get(18)?;

    Ok(ContactRecord {
        id: row.get(0)?,
        business_name: row.get(1)?,
        url: row.get(2)?,
        domain: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        contact_name: row.get(6)?,
        category: row.get(7)?,
        city: row.get(8)?,
        source: row.get(9)?,
        score: row.get(10)?,
        cms: row.get(11)?,
        cms_version: row.get(12)?,
        copyright_year: row.get(13)?,
        ssl_valid: row.get(14)?,
        mobile_friendly: row.get(15)?,
        load_time: row.get(16)?,
        outdated_tech: serde_json::from_str(&outdated_tech).unwrap_or_default(),
        stage: ContactStage::from_db_string(&stage).unwrap_or(ContactStage::New),
        notes: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
        last_contacted_at: row.get(22)?,
    })
}

fn sent_email_from_row(row: &Row<'_>) -> rusqlite::Result<SentEmailRecord> {
    let status: String = row.get(7)?;

    Ok(SentEmailRecord {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        contact_id: row.get(2)?,
        template_id: row.get(3)?,
        subject: row.get(4)?,
        body_html: row.get(5)?,
        to_email: row.get(6)?,
        status: SentEmailStatus::from_db_string(&status).unwrap_or(SentEmailStatus::Queued),
        tracking_id: row.get(8)?,
        opened_at: row.get(9)?,
        provider_id: row.get(10)?,
        error: row.get(11)?,
        sent_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<EnrollmentRecord> {
    let status: String = row.get(4)?;

    Ok(EnrollmentRecord {
        id: row.get(0)?,
        sequence_id: row.get(1)?,
        contact_id: row.get(2)?,
        current_step: row.get(3)?,
        status: EnrollmentStatus::from_db_string(&status).unwrap_or(EnrollmentStatus::Cancelled),
        enrolled_at: row.get(5)?,
        next_send_at: row.get(6)?,
    })
}

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignRecord> {
    let status: String = row.get(2)?;

    Ok(CampaignRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        status: CampaignStatus::from_db_string(&status).unwrap_or(CampaignStatus::Draft),
        total_sent: row.get(3)?,
        total_opened: row.get(4)?,
        completed_at: row.get(5)?,
    })
}

fn insert_sent_email(
    conn: &Connection,
    email: &NewSentEmail,
    at: DateTime<Utc>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO sent_emails (campaign_id, contact_id, template_id, subject, body_html,
            to_email, status, tracking_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            email.campaign_id,
            email.contact_id,
            email.template_id,
            email.subject,
            email.body_html,
            email.to_email,
            SentEmailStatus::Queued.to_db_string(),
            email.tracking_id,
            format_timestamp(at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Storage for SqliteStorage {
    // ===== Contacts =====

    fn insert_contact(&mut self, contact: &NewContact, at: DateTime<Utc>) -> StorageResult<i64> {
        let now = format_timestamp(at);
        let outdated_tech = serde_json::to_string(&contact.outdated_tech)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let stage = contact.stage.unwrap_or(ContactStage::New);

        self.conn.execute(
            "INSERT INTO contacts (business_name, url, domain, email, phone, contact_name,
                category, city, source, score, cms, cms_version, copyright_year, ssl_valid,
                mobile_friendly, load_time, outdated_tech, stage, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?20)",
            params![
                contact.business_name,
                contact.url,
                contact.domain,
                contact.email,
                contact.phone,
                contact.contact_name,
                contact.category,
                contact.city,
                contact.source,
                contact.score,
                contact.cms,
                contact.cms_version,
                contact.copyright_year,
                contact.ssl_valid,
                contact.mobile_friendly,
                contact.load_time,
                outdated_tech,
                stage.to_db_string(),
                contact.notes,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_contact(&self, contact_id: i64) -> StorageResult<Option<ContactRecord>> {
        let sql = format!("SELECT {} FROM contacts WHERE id = ?1", CONTACT_COLUMNS);
        let contact = self
            .conn
            .query_row(&sql, params![contact_id], contact_from_row)
            .optional()?;
        Ok(contact)
    }

    fn find_contact_by_domain(&self, domain: &str) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM contacts WHERE domain = ?1 ORDER BY id LIMIT 1",
                params![domain],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn find_contact_ids(&self, filter: &ContactFilter) -> StorageResult<Vec<i64>> {
        let mut sql = String::from("SELECT id FROM contacts WHERE email IS NOT NULL AND email != ''");
        let mut values: Vec<Value> = Vec::new();

        if let Some(stage) = filter.stage {
            sql.push_str(" AND stage = ?");
            values.push(Value::from(stage.to_db_string().to_string()));
        }
        if let Some(category) = &filter.category {
            sql.push_str(" AND category = ?");
            values.push(Value::from(category.clone()));
        }
        if let Some(city) = &filter.city {
            sql.push_str(" AND city = ?");
            values.push(Value::from(city.clone()));
        }
        if let Some(min_score) = filter.min_score {
            sql.push_str(" AND score >= ?");
            values.push(Value::from(i64::from(min_score)));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn update_contact_stage(
        &mut self,
        contact_id: i64,
        stage: ContactStage,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE contacts SET stage = ?1, updated_at = ?2 WHERE id = ?3",
            params![stage.to_db_string(), format_timestamp(at), contact_id],
        )?;
        if changed == 0 {
            return Err(StorageError::ContactNotFound(contact_id));
        }
        Ok(())
    }

    fn touch_last_contacted(&mut self, contact_id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE contacts SET last_contacted_at = ?1 WHERE id = ?2",
            params![format_timestamp(at), contact_id],
        )?;
        Ok(())
    }

    // ===== Activities =====

    fn record_activity(
        &mut self,
        contact_id: i64,
        kind: &str,
        title: &str,
        details: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO activities (contact_id, kind, title, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![contact_id, kind, title, details, format_timestamp(at)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_activities(&self, contact_id: i64) -> StorageResult<Vec<ActivityRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, contact_id, kind, title, details, created_at
             FROM activities WHERE contact_id = ?1 ORDER BY id",
        )?;
        let activities = stmt
            .query_map(params![contact_id], |row| {
                Ok(ActivityRecord {
                    id: row.get(0)?,
                    contact_id: row.get(1)?,
                    kind: row.get(2)?,
                    title: row.get(3)?,
                    details: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }

    // ===== Templates =====

    fn insert_template(
        &mut self,
        name: &str,
        subject: &str,
        body_html: &str,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO email_templates (name, subject, body_html) VALUES (?1, ?2, ?3)",
            params![name, subject, body_html],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_template(&self, template_id: i64) -> StorageResult<Option<TemplateRecord>> {
        let template = self
            .conn
            .query_row(
                "SELECT id, name, subject, body_html FROM email_templates WHERE id = ?1",
                params![template_id],
                |row| {
                    Ok(TemplateRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        subject: row.get(2)?,
                        body_html: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(template)
    }

    // ===== Campaigns =====

    fn insert_campaign(&mut self, name: &str, status: CampaignStatus) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO campaigns (name, status) VALUES (?1, ?2)",
            params![name, status.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_campaign(&self, campaign_id: i64) -> StorageResult<Option<CampaignRecord>> {
        let campaign = self
            .conn
            .query_row(
                "SELECT id, name, status, total_sent, total_opened, completed_at
                 FROM campaigns WHERE id = ?1",
                params![campaign_id],
                campaign_from_row,
            )
            .optional()?;
        Ok(campaign)
    }

    fn list_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> StorageResult<Vec<CampaignRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, status, total_sent, total_opened, completed_at
             FROM campaigns WHERE status = ?1 ORDER BY id",
        )?;
        let campaigns = stmt
            .query_map(params![status.to_db_string()], campaign_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(campaigns)
    }

    fn count_pending_campaign_emails(&self, campaign_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sent_emails WHERE campaign_id = ?1 AND status IN (?2, ?3)",
            params![
                campaign_id,
                SentEmailStatus::Queued.to_db_string(),
                SentEmailStatus::Sending.to_db_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn complete_campaign(&mut self, campaign_id: i64, at: DateTime<Utc>) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE campaigns SET status = ?1, completed_at = ?2 WHERE id = ?3 AND status = ?4",
            params![
                CampaignStatus::Completed.to_db_string(),
                format_timestamp(at),
                campaign_id,
                CampaignStatus::Running.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn increment_campaign_sent(&mut self, campaign_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE campaigns SET total_sent = total_sent + 1 WHERE id = ?1",
            params![campaign_id],
        )?;
        Ok(())
    }

    fn increment_campaign_opened(&mut self, campaign_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE campaigns SET total_opened = total_opened + 1 WHERE id = ?1",
            params![campaign_id],
        )?;
        Ok(())
    }

    // ===== Outbound Emails =====

    fn queue_email(&mut self, email: &NewSentEmail, at: DateTime<Utc>) -> StorageResult<i64> {
        Ok(insert_sent_email(&self.conn, email, at)?)
    }

    fn get_sent_email(&self, email_id: i64) -> StorageResult<Option<SentEmailRecord>> {
        let sql = format!("SELECT {} FROM sent_emails WHERE id = ?1", SENT_EMAIL_COLUMNS);
        let email = self
            .conn
            .query_row(&sql, params![email_id], sent_email_from_row)
            .optional()?;
        Ok(email)
    }

    fn get_sent_email_by_tracking(
        &self,
        tracking_id: &str,
    ) -> StorageResult<Option<SentEmailRecord>> {
        let sql = format!(
            "SELECT {} FROM sent_emails WHERE tracking_id = ?1",
            SENT_EMAIL_COLUMNS
        );
        let email = self
            .conn
            .query_row(&sql, params![tracking_id], sent_email_from_row)
            .optional()?;
        Ok(email)
    }

    fn list_queued_email_ids(&self, limit: u32) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM sent_emails WHERE status = ?1 ORDER BY created_at, id LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(
                params![SentEmailStatus::Queued.to_db_string(), limit],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn claim_email(&mut self, email_id: i64, at: DateTime<Utc>) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE sent_emails SET status = ?1, claimed_at = ?2 WHERE id = ?3 AND status = ?4",
            params![
                SentEmailStatus::Sending.to_db_string(),
                format_timestamp(at),
                email_id,
                SentEmailStatus::Queued.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn release_stale_claims(&mut self, claimed_before: DateTime<Utc>) -> StorageResult<usize> {
        let released = self.conn.execute(
            "UPDATE sent_emails SET status = ?1, claimed_at = NULL
             WHERE status = ?2 AND (claimed_at IS NULL OR claimed_at < ?3)",
            params![
                SentEmailStatus::Queued.to_db_string(),
                SentEmailStatus::Sending.to_db_string(),
                format_timestamp(claimed_before)
            ],
        )?;
        Ok(released)
    }

    fn mark_email_sent(
        &mut self,
        email_id: i64,
        provider_id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sent_emails SET status = ?1, provider_id = ?2, sent_at = ?3, error = NULL
             WHERE id = ?4",
            params![
                SentEmailStatus::Sent.to_db_string(),
                provider_id,
                format_timestamp(at),
                email_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::SentEmailNotFound(email_id));
        }
        Ok(())
    }

    fn mark_email_failed(&mut self, email_id: i64, error: &str) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sent_emails SET status = ?1, error = ?2 WHERE id = ?3",
            params![SentEmailStatus::Failed.to_db_string(), error, email_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SentEmailNotFound(email_id));
        }
        Ok(())
    }

    fn mark_email_opened(&mut self, email_id: i64, at: DateTime<Utc>) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE sent_emails SET opened_at = ?1, status = ?2 WHERE id = ?3 AND opened_at IS NULL",
            params![
                format_timestamp(at),
                SentEmailStatus::Opened.to_db_string(),
                email_id
            ],
        )?;
        Ok(changed == 1)
    }

    fn contact_has_opened_email(&self, contact_id: i64) -> StorageResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT id FROM sent_emails WHERE contact_id = ?1 AND opened_at IS NOT NULL LIMIT 1",
                params![contact_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list_emails_for_contact(&self, contact_id: i64) -> StorageResult<Vec<SentEmailRecord>> {
        let sql = format!(
            "SELECT {} FROM sent_emails WHERE contact_id = ?1 ORDER BY id",
            SENT_EMAIL_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let emails = stmt
            .query_map(params![contact_id], sent_email_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(emails)
    }

    // ===== Sequences =====

    fn insert_sequence(&mut self, name: &str, is_active: bool) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO sequences (name, is_active) VALUES (?1, ?2)",
            params![name, is_active],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_sequence(&self, sequence_id: i64) -> StorageResult<Option<SequenceRecord>> {
        let sequence = self
            .conn
            .query_row(
                "SELECT id, name, is_active FROM sequences WHERE id = ?1",
                params![sequence_id],
                |row| {
                    Ok(SequenceRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        is_active: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(sequence)
    }

    fn set_sequence_active(&mut self, sequence_id: i64, is_active: bool) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sequences SET is_active = ?1 WHERE id = ?2",
            params![is_active, sequence_id],
        )?;
        Ok(())
    }

    fn insert_sequence_step(
        &mut self,
        sequence_id: i64,
        step_order: u32,
        template_id: i64,
        delay_days: u32,
        condition: Option<StepCondition>,
    ) -> StorageResult<i64> {
        let condition = condition
            .map(|c| serde_json::to_string(&c))
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO sequence_steps (sequence_id, step_order, template_id, delay_days, condition)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![sequence_id, step_order, template_id, delay_days, condition],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_sequence_steps(&self, sequence_id: i64) -> StorageResult<Vec<SequenceStepRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sequence_id, step_order, template_id, delay_days, condition
             FROM sequence_steps WHERE sequence_id = ?1 ORDER BY step_order",
        )?;
        let steps = stmt
            .query_map(params![sequence_id], |row| {
                let condition: Option<String> = row.get(5)?;
                Ok(SequenceStepRecord {
                    id: row.get(0)?,
                    sequence_id: row.get(1)?,
                    step_order: row.get(2)?,
                    template_id: row.get(3)?,
                    delay_days: row.get(4)?,
                    // An unreadable condition behaves like no condition
                    condition: condition.and_then(|c| serde_json::from_str(&c).ok()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(steps)
    }

    // ===== Enrollments =====

    fn find_active_enrollment(
        &self,
        sequence_id: i64,
        contact_id: i64,
    ) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM sequence_enrollments
                 WHERE sequence_id = ?1 AND contact_id = ?2 AND status = ?3",
                params![
                    sequence_id,
                    contact_id,
                    EnrollmentStatus::Active.to_db_string()
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn insert_enrollment(
        &mut self,
        sequence_id: i64,
        contact_id: i64,
        next_send_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO sequence_enrollments
                (sequence_id, contact_id, current_step, status, enrolled_at, next_send_at)
             VALUES (?1, ?2, 0, ?3, ?4, ?5)",
            params![
                sequence_id,
                contact_id,
                EnrollmentStatus::Active.to_db_string(),
                format_timestamp(at),
                format_timestamp(next_send_at)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_enrollment(&self, enrollment_id: i64) -> StorageResult<Option<EnrollmentRecord>> {
        let sql = format!(
            "SELECT {} FROM sequence_enrollments WHERE id = ?1",
            ENROLLMENT_COLUMNS
        );
        let enrollment = self
            .conn
            .query_row(&sql, params![enrollment_id], enrollment_from_row)
            .optional()?;
        Ok(enrollment)
    }

    fn list_enrollments(&self, sequence_id: i64) -> StorageResult<Vec<EnrollmentRecord>> {
        let sql = format!(
            "SELECT {} FROM sequence_enrollments WHERE sequence_id = ?1 ORDER BY id",
            ENROLLMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let enrollments = stmt
            .query_map(params![sequence_id], enrollment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(enrollments)
    }

    fn due_enrollments(&self, now: DateTime<Utc>) -> StorageResult<Vec<EnrollmentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.sequence_id, e.contact_id, e.current_step, e.status,
                    e.enrolled_at, e.next_send_at
             FROM sequence_enrollments e
             JOIN sequences s ON e.sequence_id = s.id
             WHERE e.status = ?1 AND e.next_send_at <= ?2 AND s.is_active = 1
             ORDER BY e.next_send_at, e.id",
        )?;
        let enrollments = stmt
            .query_map(
                params![EnrollmentStatus::Active.to_db_string(), format_timestamp(now)],
                enrollment_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(enrollments)
    }

    fn finish_enrollment(
        &mut self,
        enrollment_id: i64,
        status: EnrollmentStatus,
    ) -> StorageResult<bool> {
        if !EnrollmentStatus::Active.can_transition_to(status) {
            return Ok(false);
        }
        let changed = self.conn.execute(
            "UPDATE sequence_enrollments SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![
                status.to_db_string(),
                enrollment_id,
                EnrollmentStatus::Active.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn dispatch_step(&mut self, dispatch: &StepDispatch) -> StorageResult<Option<i64>> {
        let tx = self.conn.transaction()?;

        let next_step = dispatch.expected_step + 1;
        let advanced = match dispatch.next_send_at {
            Some(next_send_at) => tx.execute(
                "UPDATE sequence_enrollments SET current_step = ?1, next_send_at = ?2
                 WHERE id = ?3 AND status = ?4 AND current_step = ?5",
                params![
                    next_step,
                    format_timestamp(next_send_at),
                    dispatch.enrollment_id,
                    EnrollmentStatus::Active.to_db_string(),
                    dispatch.expected_step
                ],
            )?,
            None => tx.execute(
                "UPDATE sequence_enrollments SET current_step = ?1, status = ?2
                 WHERE id = ?3 AND status = ?4 AND current_step = ?5",
                params![
                    next_step,
                    EnrollmentStatus::Completed.to_db_string(),
                    dispatch.enrollment_id,
                    EnrollmentStatus::Active.to_db_string(),
                    dispatch.expected_step
                ],
            )?,
        };

        if advanced == 0 {
            // Dropping the transaction rolls it back
            return Ok(None);
        }

        let email_id = insert_sent_email(&tx, &dispatch.email, dispatch.at)?;

        if dispatch.promote_contact {
            tx.execute(
                "UPDATE contacts SET stage = ?1, updated_at = ?2 WHERE id = ?3 AND stage = ?4",
                params![
                    ContactStage::Contacted.to_db_string(),
                    format_timestamp(dispatch.at),
                    dispatch.email.contact_id,
                    ContactStage::New.to_db_string()
                ],
            )?;
        }

        tx.commit()?;
        Ok(Some(email_id))
    }
}
