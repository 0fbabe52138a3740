//! Delayed email sequences
//!
//! - `enroll`: adding contacts to a sequence and cancelling enrollments
//! - `engine`: the periodic pass that sends due steps and applies stop conditions

mod engine;
mod enroll;

pub use engine::{decide_step, SequenceEngine, StepDecision, StopReason, TickReport};
pub use enroll::{cancel_enrollment, enroll, enroll_request, EnrollRequest, EnrollSummary};

use thiserror::Error;

/// Enrollment precondition failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Sequence {0} not found or inactive")]
    NotFound(i64),

    #[error("Sequence {0} has no steps")]
    NoSteps(i64),
}
