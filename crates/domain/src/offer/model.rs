//! Offer records and submission requests.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{ListingId, OfferId, UserId};
use document_store::Patch;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::OfferStatus;
use crate::error::DomainError;
use crate::money::Money;
use crate::record::{Record, fields};

/// Days to close when the buyer does not say.
pub const DEFAULT_CLOSING_TIMELINE_DAYS: u32 = 60;

/// How the buyer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancingTerms {
    Cash,
    SellerFinancing,
    BankFinancing,
    SbaLoan,
}

impl FinancingTerms {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinancingTerms::Cash => "cash",
            FinancingTerms::SellerFinancing => "seller_financing",
            FinancingTerms::BankFinancing => "bank_financing",
            FinancingTerms::SbaLoan => "sba_loan",
        }
    }
}

impl std::str::FromStr for FinancingTerms {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(FinancingTerms::Cash),
            "seller_financing" => Ok(FinancingTerms::SellerFinancing),
            "bank_financing" => Ok(FinancingTerms::BankFinancing),
            "sba_loan" => Ok(FinancingTerms::SbaLoan),
            other => Err(DomainError::validation(format!(
                "Unknown financing terms: {other}"
            ))),
        }
    }
}

/// A buyer's proposal to acquire a listed business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub business_id: ListingId,
    pub buyer_id: UserId,
    pub offer_amount: Money,
    #[serde(default)]
    pub down_payment: Option<Money>,
    #[serde(default)]
    pub financing_terms: Option<FinancingTerms>,
    #[serde(default)]
    pub contingencies: BTreeSet<String>,
    pub closing_timeline: u32,
    #[serde(default)]
    pub additional_notes: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Offer {
    type Id = OfferId;
    const COLLECTION: &'static str = "offers";
    const KIND: &'static str = "Offer";

    fn id(&self) -> OfferId {
        self.id
    }
}

impl Offer {
    /// Validates a submission and builds the pending offer.
    pub fn submit(buyer_id: UserId, new: NewOffer, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if !new.offer_amount.is_positive() {
            return Err(DomainError::validation("Offer amount must be positive"));
        }
        if let Some(down) = new.down_payment {
            if down.is_negative() {
                return Err(DomainError::validation("Down payment cannot be negative"));
            }
            if down > new.offer_amount {
                return Err(DomainError::validation(
                    "Down payment cannot exceed the offer amount",
                ));
            }
        }
        let closing_timeline = match new.closing_timeline {
            None => DEFAULT_CLOSING_TIMELINE_DAYS,
            Some(days) if days > 0 => u32::try_from(days)
                .map_err(|_| DomainError::validation("Closing timeline is too long"))?,
            Some(_) => {
                return Err(DomainError::validation(
                    "Closing timeline must be a positive number of days",
                ));
            }
        };
        let financing_terms = new
            .financing_terms
            .as_deref()
            .map(str::parse::<FinancingTerms>)
            .transpose()?;
        let contingencies = new
            .contingencies
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        Ok(Self {
            id: OfferId::new(),
            business_id: new.business_id,
            buyer_id,
            offer_amount: new.offer_amount,
            down_payment: new.down_payment,
            financing_terms,
            contingencies,
            closing_timeline,
            additional_notes: new.additional_notes,
            status: OfferStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status_fields(status: OfferStatus, now: DateTime<Utc>) -> Patch {
        fields(json!({ "status": status, "updated_at": now }))
    }
}

/// A buyer's offer submission.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    pub business_id: ListingId,
    pub offer_amount: Money,
    #[serde(default)]
    pub down_payment: Option<Money>,
    #[serde(default)]
    pub financing_terms: Option<String>,
    #[serde(default)]
    pub contingencies: Vec<String>,
    /// Days; defaults to 60.
    #[serde(default)]
    pub closing_timeline: Option<i64>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl NewOffer {
    pub fn new(business_id: ListingId, offer_amount: Money) -> Self {
        Self {
            business_id,
            offer_amount,
            down_payment: None,
            financing_terms: None,
            contingencies: Vec::new(),
            closing_timeline: None,
            additional_notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_offer() -> NewOffer {
        NewOffer::new(ListingId::new(), Money::from_dollars(950_000))
    }

    #[test]
    fn submit_builds_pending_offer_with_defaults() {
        let offer = Offer::submit(UserId::new(), new_offer(), Utc::now()).unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);
        assert_eq!(offer.closing_timeline, DEFAULT_CLOSING_TIMELINE_DAYS);
        assert!(offer.contingencies.is_empty());
    }

    #[test]
    fn amount_must_be_positive() {
        let mut new = new_offer();
        new.offer_amount = Money::zero();
        assert!(matches!(
            Offer::submit(UserId::new(), new, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn closing_timeline_must_be_positive() {
        let mut new = new_offer();
        new.closing_timeline = Some(0);
        assert!(Offer::submit(UserId::new(), new, Utc::now()).is_err());

        let mut new = new_offer();
        new.closing_timeline = Some(-30);
        assert!(Offer::submit(UserId::new(), new, Utc::now()).is_err());
    }

    #[test]
    fn down_payment_cannot_exceed_offer() {
        let mut new = new_offer();
        new.down_payment = Some(Money::from_dollars(1_000_000));
        assert!(Offer::submit(UserId::new(), new, Utc::now()).is_err());
    }

    #[test]
    fn financing_terms_must_be_known() {
        let mut new = new_offer();
        new.financing_terms = Some("sba_loan".into());
        let offer = Offer::submit(UserId::new(), new, Utc::now()).unwrap();
        assert_eq!(offer.financing_terms, Some(FinancingTerms::SbaLoan));

        let mut new = new_offer();
        new.financing_terms = Some("crypto".into());
        assert!(Offer::submit(UserId::new(), new, Utc::now()).is_err());
    }

    #[test]
    fn contingencies_are_a_set() {
        let mut new = new_offer();
        new.contingencies = vec![
            "financing".into(),
            "inspection".into(),
            " financing ".into(),
            "".into(),
        ];
        let offer = Offer::submit(UserId::new(), new, Utc::now()).unwrap();
        assert_eq!(offer.contingencies.len(), 2);
    }
}
