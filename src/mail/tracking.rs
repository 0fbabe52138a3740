use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Utc};
use tracing::debug;

/// 1x1 transparent GIF served for open tracking
pub static TRACKING_PIXEL: [u8; 42] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

/// Records that the email carrying `tracking_id` was opened
///
/// Only the first open stamps `opened_at`, bumps the campaign counter and
/// logs an activity. Returns false for unknown tracking IDs.
pub fn record_open<S: Storage>(
    storage: &mut S,
    tracking_id: &str,
    at: DateTime<Utc>,
) -> StorageResult<bool> {
    let Some(email) = storage.get_sent_email_by_tracking(tracking_id)? else {
        debug!("Open for unknown tracking id {}", tracking_id);
        return Ok(false);
    };

    if storage.mark_email_opened(email.id, at)? {
        if let Some(campaign_id) = email.campaign_id {
            storage.increment_campaign_opened(campaign_id)?;
        }
        storage.record_activity(email.contact_id, "email_opened", "Email otevřen", None, at)?;
    }

    Ok(true)
}
