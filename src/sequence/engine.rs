use crate::mail::{Delivery, MailQueue, TemplateRenderer};
use crate::state::{ContactStage, EnrollmentStatus};
use crate::storage::{
    lock_storage, ContactRecord, EnrollmentRecord, NewSentEmail, SequenceStepRecord,
    SharedStorage, StepDispatch, Storage,
};
use crate::LeadscopeError;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why an enrollment stops before (or instead of) sending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every step has been sent
    Exhausted,
    /// The contact is gone or has no email address
    MissingEmail,
    /// `skip_if_replied` and the contact has responded
    Replied,
    /// `skip_if_opened` and the contact opened an earlier email
    Opened,
    /// The contact reached responded, meeting or client
    Engaged,
}

impl StopReason {
    /// Terminal status the enrollment moves to
    pub fn status(&self) -> EnrollmentStatus {
        match self {
            Self::MissingEmail => EnrollmentStatus::Cancelled,
            _ => EnrollmentStatus::Completed,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Exhausted => "sequence exhausted",
            Self::MissingEmail => "contact has no email",
            Self::Replied => "contact replied",
            Self::Opened => "contact opened an email",
            Self::Engaged => "contact engaged",
        };
        write!(f, "{}", text)
    }
}

/// What to do with one due enrollment
#[derive(Debug, PartialEq)]
pub enum StepDecision<'a> {
    Stop(StopReason),
    Send {
        step: &'a SequenceStepRecord,
        contact: &'a ContactRecord,
        to: &'a str,
    },
}

/// Evaluates stop conditions for the enrollment's current step
///
/// # Order
///
/// 1. Step index past the last step: exhausted
/// 2. Missing contact or empty email: cancel
/// 3. Step condition `skip_if_replied` with stage `responded`
/// 4. Step condition `skip_if_opened` with `has_opened`
/// 5. Engaged stage
///
/// `has_opened` is only consulted when the step asks for it.
pub fn decide_step<'a>(
    current_step: u32,
    steps: &'a [SequenceStepRecord],
    contact: Option<&'a ContactRecord>,
    has_opened: bool,
) -> StepDecision<'a> {
    let Some(step) = steps.get(current_step as usize) else {
        return StepDecision::Stop(StopReason::Exhausted);
    };

    let Some((contact, to)) = contact.and_then(|contact| {
        contact
            .email
            .as_deref()
            .filter(|email| !email.is_empty())
            .map(|email| (contact, email))
    }) else {
        return StepDecision::Stop(StopReason::MissingEmail);
    };

    if let Some(condition) = &step.condition {
        if condition.skip_if_replied && contact.stage == ContactStage::Responded {
            return StepDecision::Stop(StopReason::Replied);
        }
        if condition.skip_if_opened && has_opened {
            return StepDecision::Stop(StopReason::Opened);
        }
    }

    if contact.stage.is_engaged() {
        return StepDecision::Stop(StopReason::Engaged);
    }

    StepDecision::Send { step, contact, to }
}

/// Counters for one engine pass, plus the deliveries it handed off
#[derive(Debug, Default)]
pub struct TickReport {
    pub due: usize,
    pub sent: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Missing template, or another pass already advanced the enrollment
    pub skipped: usize,
    pub failed: usize,
    pub deliveries: Vec<Delivery>,
}

enum StepOutcome {
    Sent { email_id: i64, last_step: bool },
    Stopped(StopReason),
    Skipped,
}

/// Advances due enrollments through their sequences
#[derive(Clone)]
pub struct SequenceEngine {
    storage: SharedStorage,
    renderer: Arc<dyn TemplateRenderer>,
    queue: MailQueue,
}

impl SequenceEngine {
    pub fn new(
        storage: SharedStorage,
        renderer: Arc<dyn TemplateRenderer>,
        queue: MailQueue,
    ) -> Self {
        Self {
            storage,
            renderer,
            queue,
        }
    }

    /// Processes every enrollment due at `now`
    ///
    /// Each enrollment is handled independently; a failure is counted and
    /// logged without stopping the rest of the pass. Queued emails are
    /// handed to the mail queue and returned as deliveries.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, LeadscopeError> {
        let due = lock_storage(&self.storage)?.due_enrollments(now)?;
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };

        for enrollment in &due {
            match self.process(enrollment, now) {
                Ok(StepOutcome::Sent {
                    email_id,
                    last_step,
                }) => {
                    report.sent += 1;
                    if last_step {
                        report.completed += 1;
                    }
                    // A row that cannot be handed off stays queued for the next drain
                    match self.queue.submit(email_id) {
                        Ok(delivery) => report.deliveries.push(delivery),
                        Err(e) => warn!("Email {} left queued: {}", email_id, e),
                    }
                }
                Ok(StepOutcome::Stopped(reason)) => match reason.status() {
                    EnrollmentStatus::Cancelled => report.cancelled += 1,
                    _ => report.completed += 1,
                },
                Ok(StepOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!("Enrollment {} failed: {}", enrollment.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.due > 0 {
            info!(
                "Sequence pass: {} due, {} sent, {} completed, {} cancelled, {} skipped, {} failed",
                report.due,
                report.sent,
                report.completed,
                report.cancelled,
                report.skipped,
                report.failed
            );
        }
        Ok(report)
    }

    fn process(
        &self,
        enrollment: &EnrollmentRecord,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, LeadscopeError> {
        let mut storage = lock_storage(&self.storage)?;

        let steps = storage.get_sequence_steps(enrollment.sequence_id)?;
        let contact = storage.get_contact(enrollment.contact_id)?;

        let wants_opened = steps
            .get(enrollment.current_step as usize)
            .and_then(|step| step.condition.as_ref())
            .is_some_and(|condition| condition.skip_if_opened);
        let has_opened = wants_opened && storage.contact_has_opened_email(enrollment.contact_id)?;

        let (step, contact, to) =
            match decide_step(enrollment.current_step, &steps, contact.as_ref(), has_opened) {
                StepDecision::Send { step, contact, to } => (step, contact, to),
                StepDecision::Stop(reason) => {
                    if !storage.finish_enrollment(enrollment.id, reason.status())? {
                        return Ok(StepOutcome::Skipped);
                    }
                    debug!("Enrollment {} stopped: {}", enrollment.id, reason);
                    return Ok(StepOutcome::Stopped(reason));
                }
            };

        let Some(template) = storage.get_template(step.template_id)? else {
            warn!(
                "Template {} for sequence {} step {} not found",
                step.template_id, enrollment.sequence_id, step.step_order
            );
            return Ok(StepOutcome::Skipped);
        };

        let rendered = self
            .renderer
            .render(&template.subject, &template.body_html, contact);

        let next_send_at = steps
            .get(enrollment.current_step as usize + 1)
            .map(|next| now + Duration::days(i64::from(next.delay_days)));

        let dispatch = StepDispatch {
            enrollment_id: enrollment.id,
            expected_step: enrollment.current_step,
            next_send_at,
            email: NewSentEmail {
                campaign_id: None,
                contact_id: contact.id,
                template_id: Some(template.id),
                subject: rendered.subject,
                body_html: rendered.body,
                to_email: to.to_string(),
                tracking_id: Uuid::new_v4().to_string(),
            },
            promote_contact: contact.stage == ContactStage::New,
            at: now,
        };

        match storage.dispatch_step(&dispatch)? {
            Some(email_id) => {
                debug!(
                    "Enrollment {} step {} queued as email {}",
                    enrollment.id, enrollment.current_step, email_id
                );
                Ok(StepOutcome::Sent {
                    email_id,
                    last_step: next_send_at.is_none(),
                })
            }
            None => Ok(StepOutcome::Skipped),
        }
    }
}
