/// Enrollment lifecycle definitions
///
/// `Active` is the only state the sequence engine acts on. `Completed` and
/// `Cancelled` are terminal: no transition leaves them.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the state of one contact's progress through one sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    /// Waiting for the next step to come due
    Active,

    /// Sequence exhausted or a stop condition was met
    Completed,

    /// The contact cannot be reached or the enrollment was cancelled by hand
    Cancelled,
}

impl EnrollmentStatus {
    /// Returns true if this is a terminal state (no further processing)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Returns true if the transition `self -> to` is allowed
    pub fn can_transition_to(&self, to: EnrollmentStatus) -> bool {
        matches!(
            (self, to),
            (Self::Active, Self::Completed) | (Self::Active, Self::Cancelled)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
