//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the LeadScope database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Leads and their scan signals
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    business_name TEXT,
    url TEXT,
    domain TEXT,
    email TEXT,
    phone TEXT,
    contact_name TEXT,
    category TEXT,
    city TEXT,
    source TEXT NOT NULL DEFAULT 'manual',
    score INTEGER NOT NULL DEFAULT 0,
    cms TEXT,
    cms_version TEXT,
    copyright_year INTEGER,
    ssl_valid INTEGER NOT NULL DEFAULT 1,
    mobile_friendly INTEGER NOT NULL DEFAULT 1,
    load_time REAL,
    outdated_tech TEXT NOT NULL DEFAULT '[]',
    stage TEXT NOT NULL DEFAULT 'new',
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_contacted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_contacts_stage ON contacts(stage);
CREATE INDEX IF NOT EXISTS idx_contacts_domain ON contacts(domain);
CREATE INDEX IF NOT EXISTS idx_contacts_score ON contacts(score DESC);

-- Per-contact activity log
CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activities_contact ON activities(contact_id);

CREATE TABLE IF NOT EXISTS email_templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    subject TEXT NOT NULL,
    body_html TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS campaigns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    total_sent INTEGER NOT NULL DEFAULT 0,
    total_opened INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns(status);

-- Outbound email queue and delivery log
CREATE TABLE IF NOT EXISTS sent_emails (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id INTEGER REFERENCES campaigns(id),
    contact_id INTEGER NOT NULL REFERENCES contacts(id),
    template_id INTEGER REFERENCES email_templates(id),
    subject TEXT NOT NULL,
    body_html TEXT,
    to_email TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    tracking_id TEXT NOT NULL UNIQUE,
    opened_at TEXT,
    provider_id TEXT,
    error TEXT,
    claimed_at TEXT,
    sent_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sent_emails_status ON sent_emails(status, created_at);
CREATE INDEX IF NOT EXISTS idx_sent_emails_contact ON sent_emails(contact_id);
CREATE INDEX IF NOT EXISTS idx_sent_emails_campaign ON sent_emails(campaign_id);

CREATE TABLE IF NOT EXISTS sequences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS sequence_steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sequence_id INTEGER NOT NULL REFERENCES sequences(id) ON DELETE CASCADE,
    step_order INTEGER NOT NULL,
    template_id INTEGER NOT NULL REFERENCES email_templates(id),
    delay_days INTEGER NOT NULL DEFAULT 3,
    condition TEXT,
    UNIQUE(sequence_id, step_order)
);

CREATE TABLE IF NOT EXISTS sequence_enrollments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sequence_id INTEGER NOT NULL REFERENCES sequences(id),
    contact_id INTEGER NOT NULL REFERENCES contacts(id),
    current_step INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    enrolled_at TEXT NOT NULL,
    next_send_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_enrollments_due ON sequence_enrollments(status, next_send_at);

-- At most one active enrollment per (sequence, contact)
CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_one_active
    ON sequence_enrollments(sequence_id, contact_id) WHERE status = 'active';
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
