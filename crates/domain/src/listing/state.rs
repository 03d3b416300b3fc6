//! Listing lifecycle.

use serde::{Deserialize, Serialize};

/// The status of a business listing.
///
/// ```text
/// Draft ──► Active ──► UnderLoi ──► Closed
///   └──────────────────────▲
/// ```
///
/// `UnderLoi` is entered only by accepting an offer and is never left
/// except towards `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Draft,
    Active,
    UnderLoi,
    Closed,
}

impl ListingStatus {
    pub fn can_publish(&self) -> bool {
        matches!(self, ListingStatus::Draft)
    }

    /// Seller edits and deletion are allowed only before a deal exists.
    pub fn can_edit(&self) -> bool {
        matches!(self, ListingStatus::Draft | ListingStatus::Active)
    }

    pub fn can_receive_offers(&self) -> bool {
        matches!(self, ListingStatus::Active)
    }

    pub fn can_receive_investments(&self) -> bool {
        matches!(self, ListingStatus::Active)
    }

    /// Accepting an offer moves the listing under a letter of intent.
    pub fn can_enter_loi(&self) -> bool {
        matches!(self, ListingStatus::Draft | ListingStatus::Active)
    }

    pub fn can_close(&self) -> bool {
        matches!(self, ListingStatus::UnderLoi)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::Closed)
    }

    /// Statuses from which a listing may still be edited or go under LOI.
    pub fn open_statuses() -> [&'static str; 2] {
        [ListingStatus::Draft.as_str(), ListingStatus::Active.as_str()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Active => "active",
            ListingStatus::UnderLoi => "under_loi",
            ListingStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
