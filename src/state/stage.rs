/// Pipeline stage definitions for contacts
///
/// The sequence engine reads the stage to decide whether to keep nagging a
/// contact and promotes `New` to `Contacted` on the first touch.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a contact's position in the sales pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStage {
    /// Lead found, never emailed
    New,

    /// At least one outbound email sent
    Contacted,

    /// The contact wrote back
    Responded,

    /// A meeting is scheduled or happened
    Meeting,

    /// Converted
    Client,

    /// Dropped out of the pipeline
    Lost,
}

impl ContactStage {
    /// Returns true once the contact has engaged and automated follow-ups must stop
    pub fn is_engaged(&self) -> bool {
        matches!(self, Self::Responded | Self::Meeting | Self::Client)
    }

    /// Converts the stage to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Responded => "responded",
            Self::Meeting => "meeting",
            Self::Client => "client",
            Self::Lost => "lost",
        }
    }

    /// Parses a stage from its database string representation
    ///
    /// Returns None if the string doesn't match any known stage.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "responded" => Some(Self::Responded),
            "meeting" => Some(Self::Meeting),
            "client" => Some(Self::Client),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }

    /// Returns all stages in pipeline order
    pub fn all_stages() -> Vec<Self> {
        vec![
            Self::New,
            Self::Contacted,
            Self::Responded,
            Self::Meeting,
            Self::Client,
            Self::Lost,
        ]
    }
}

impl fmt::Display for ContactStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
