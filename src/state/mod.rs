//! State module for pipeline and outreach lifecycles
//!
//! # Components
//!
//! - `ContactStage`: a contact's position in the sales pipeline
//! - `EnrollmentStatus`: progress state of one contact in one sequence
//! - `SentEmailStatus`: delivery state of one outbound email row
//! - `CampaignStatus`: lifecycle of a bulk campaign

mod delivery;
mod enrollment;
mod stage;

// Re-export main types
pub use delivery::{CampaignStatus, SentEmailStatus};
pub use enrollment::EnrollmentStatus;
pub use stage::ContactStage;
