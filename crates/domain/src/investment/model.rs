use chrono::{DateTime, Utc};
use common::{InvestmentId, ListingId, UserId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::record::Record;

/// A pledge of capital by an investor towards a listing's funding target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: InvestmentId,
    pub business_id: ListingId,
    pub investor_id: UserId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl Record for Investment {
    type Id = InvestmentId;
    const COLLECTION: &'static str = "investments";
    const KIND: &'static str = "Investment";

    fn id(&self) -> InvestmentId {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvestment {
    pub business_id: ListingId,
    pub amount: Money,
}
