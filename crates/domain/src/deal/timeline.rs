//! The append-only history of a deal.

use chrono::{DateTime, Utc};
use common::{DealId, TimelineEventId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;
use crate::record::Record;

pub const OFFER_ACCEPTED: &str = "offer_accepted";
pub const DOCUMENT_ADDED: &str = "document_added";
pub const DEAL_COMPLETED: &str = "deal_completed";

/// One entry in a deal's history. Never modified or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: TimelineEventId,
    pub deal_id: DealId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
}

impl Record for TimelineEvent {
    type Id = TimelineEventId;
    const COLLECTION: &'static str = "timeline_events";
    const KIND: &'static str = "Timeline event";

    fn id(&self) -> TimelineEventId {
        self.id
    }
}

impl TimelineEvent {
    fn new(
        deal_id: DealId,
        title: impl Into<String>,
        description: Option<String>,
        event_type: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TimelineEventId::new(),
            deal_id,
            title: title.into(),
            description,
            event_type: event_type.into(),
            timestamp: now,
        }
    }

    pub fn offer_accepted(deal_id: DealId, amount: Money, now: DateTime<Utc>) -> Self {
        Self::new(
            deal_id,
            "Offer Accepted",
            Some(format!("Offer of {amount} was accepted by the seller")),
            OFFER_ACCEPTED,
            now,
        )
    }

    pub fn document_added(
        deal_id: DealId,
        file_name: &str,
        uploaded_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            deal_id,
            "Document Added",
            Some(format!("{file_name} was added to the deal by {uploaded_by}")),
            DOCUMENT_ADDED,
            now,
        )
    }

    pub fn deal_completed(deal_id: DealId, now: DateTime<Utc>) -> Self {
        Self::new(
            deal_id,
            "Deal Completed",
            Some("The transaction has been completed successfully".to_string()),
            DEAL_COMPLETED,
            now,
        )
    }

    /// A milestone reported by one of the deal parties.
    pub fn reported(
        deal_id: DealId,
        new: NewTimelineEvent,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if new.title.trim().is_empty() {
            return Err(DomainError::validation("Timeline event title is required"));
        }
        if new.event_type.trim().is_empty() {
            return Err(DomainError::validation("Timeline event type is required"));
        }
        Ok(Self::new(
            deal_id,
            new.title.trim(),
            new.description,
            new.event_type.trim(),
            now,
        ))
    }
}

/// A milestone submitted by a deal party.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTimelineEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_accepted_mentions_formatted_amount() {
        let event =
            TimelineEvent::offer_accepted(DealId::new(), Money::from_dollars(950_000), Utc::now());
        assert_eq!(event.title, "Offer Accepted");
        assert_eq!(event.event_type, OFFER_ACCEPTED);
        assert_eq!(
            event.description.as_deref(),
            Some("Offer of $950,000.00 was accepted by the seller")
        );
    }

    #[test]
    fn document_added_names_file_and_uploader() {
        let uploader = UserId::new();
        let event = TimelineEvent::document_added(DealId::new(), "LOI.pdf", uploader, Utc::now());
        let description = event.description.unwrap();
        assert!(description.contains("LOI.pdf"));
        assert!(description.contains(&uploader.to_string()));
    }

    #[test]
    fn reported_event_requires_title_and_type() {
        let blank = NewTimelineEvent {
            title: " ".into(),
            description: None,
            event_type: "note".into(),
        };
        assert!(TimelineEvent::reported(DealId::new(), blank, Utc::now()).is_err());

        let ok = NewTimelineEvent {
            title: "Diligence started".into(),
            description: Some("Financials shared".into()),
            event_type: "milestone".into(),
        };
        let event = TimelineEvent::reported(DealId::new(), ok, Utc::now()).unwrap();
        assert_eq!(event.event_type, "milestone");
    }
}
