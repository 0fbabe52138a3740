use crate::state::CampaignStatus;
use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Utc};
use tracing::info;

/// Completes every running campaign with no queued or in-flight emails
///
/// # Returns
///
/// IDs of the campaigns completed by this call
pub fn reconcile_campaigns<S: Storage>(storage: &mut S, now: DateTime<Utc>) -> StorageResult<Vec<i64>> {
    let mut completed = Vec::new();

    for campaign in storage.list_campaigns_by_status(CampaignStatus::Running)? {
        if storage.count_pending_campaign_emails(campaign.id)? > 0 {
            continue;
        }
        if storage.complete_campaign(campaign.id, now)? {
            info!("Campaign \"{}\" completed", campaign.name);
            completed.push(campaign.id);
        }
    }

    Ok(completed)
}
