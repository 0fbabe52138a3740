use crate::sequence::SequenceError;
use crate::state::EnrollmentStatus;
use crate::storage::{ContactFilter, Storage};
use crate::LeadscopeError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Who to enroll: explicit IDs, or a filter used only when no IDs are given
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollRequest {
    pub contact_ids: Option<Vec<i64>>,
    pub filter: Option<ContactFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrollSummary {
    pub enrolled: usize,
    pub total: usize,
}

/// Enrolls contacts into a sequence at step 0
///
/// The sequence must be active and have at least one step. Contacts that
/// already hold an active enrollment in this sequence, or that do not exist,
/// are skipped. The first send is scheduled `delay_days` of the first step
/// after `now`.
///
/// Returns the number of new enrollments.
pub fn enroll<S: Storage>(
    storage: &mut S,
    sequence_id: i64,
    contact_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<usize, LeadscopeError> {
    let sequence = storage
        .get_sequence(sequence_id)?
        .filter(|sequence| sequence.is_active)
        .ok_or(SequenceError::NotFound(sequence_id))?;

    let steps = storage.get_sequence_steps(sequence_id)?;
    let first_step = steps.first().ok_or(SequenceError::NoSteps(sequence_id))?;
    let next_send_at = now + Duration::days(i64::from(first_step.delay_days));

    let details = serde_json::json!({ "sequence": sequence.name }).to_string();
    let mut enrolled = 0;

    for &contact_id in contact_ids {
        if storage.find_active_enrollment(sequence_id, contact_id)?.is_some() {
            debug!(
                "Contact {} already active in sequence {}",
                contact_id, sequence_id
            );
            continue;
        }
        if storage.get_contact(contact_id)?.is_none() {
            debug!("Contact {} not found; not enrolling", contact_id);
            continue;
        }

        storage.insert_enrollment(sequence_id, contact_id, next_send_at, now)?;
        storage.record_activity(
            contact_id,
            "sequence_enrolled",
            "Přidán do sekvence",
            Some(&details),
            now,
        )?;
        enrolled += 1;
    }

    info!(
        "Enrolled {}/{} contacts into sequence \"{}\"",
        enrolled,
        contact_ids.len(),
        sequence.name
    );
    Ok(enrolled)
}

/// Resolves an [`EnrollRequest`] to contact IDs and enrolls them
pub fn enroll_request<S: Storage>(
    storage: &mut S,
    sequence_id: i64,
    request: &EnrollRequest,
    now: DateTime<Utc>,
) -> Result<EnrollSummary, LeadscopeError> {
    let ids = match (&request.contact_ids, &request.filter) {
        (Some(ids), _) => ids.clone(),
        (None, Some(filter)) => storage.find_contact_ids(filter)?,
        (None, None) => Vec::new(),
    };

    let enrolled = enroll(storage, sequence_id, &ids, now)?;
    Ok(EnrollSummary {
        enrolled,
        total: ids.len(),
    })
}

/// Cancels an active enrollment
///
/// Returns false when the enrollment is unknown or already terminal.
pub fn cancel_enrollment<S: Storage>(
    storage: &mut S,
    enrollment_id: i64,
) -> Result<bool, LeadscopeError> {
    let cancelled = storage.finish_enrollment(enrollment_id, EnrollmentStatus::Cancelled)?;
    if cancelled {
        info!("Cancelled enrollment {}", enrollment_id);
    }
    Ok(cancelled)
}
