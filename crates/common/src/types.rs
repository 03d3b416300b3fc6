use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a path or token value is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for IdParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} id: {}", self.kind, self.value)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|_| IdParseError {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// A registered person, as resolved by the identity provider.
    UserId,
    "user"
);
define_id!(
    /// A business offered for sale on the marketplace.
    ListingId,
    "listing"
);
define_id!(OfferId, "offer");
define_id!(
    /// A transaction in progress between a buyer and a seller.
    DealId,
    "deal"
);
define_id!(TimelineEventId, "timeline event");
define_id!(DocumentId, "document");
define_id!(InvestmentId, "investment");
define_id!(
    /// A deal tracked in a user's private acquisition pipeline.
    PipelineDealId,
    "pipeline deal"
);
