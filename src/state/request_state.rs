/// Request state definitions for the persisted request queue
use std::fmt;

/// Lifecycle of one crawl request in the `requests` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Enqueued and not yet dispatched to completion
    Pending,

    /// Fetched and handled (including handler extraction gaps)
    Handled,

    /// Fetch failed after all attempts
    Failed,
}

impl RequestState {
    /// Converts the request state to its database string
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Handled => "handled",
            Self::Failed => "failed",
        }
    }

    /// Parses a request state from its database string
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "handled" => Some(Self::Handled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all request states
    pub fn all_states() -> [Self; 3] {
        [Self::Pending, Self::Handled, Self::Failed]
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
