//! Offer lifecycle.

use serde::{Deserialize, Serialize};

/// The status of an offer.
///
/// ```text
/// Pending ──┬──► Accepted
///           └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn can_accept(&self) -> bool {
        matches!(self, OfferStatus::Pending)
    }

    pub fn can_reject(&self) -> bool {
        matches!(self, OfferStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
