//! Investment ledger.

use chrono::Utc;
use common::{InvestmentId, ListingId};
use document_store::{DocumentStore, Precondition, WriteBatch};
use serde_json::json;

use super::{Investment, NewInvestment};
use crate::error::DomainError;
use crate::identity::Caller;
use crate::listing::{BusinessListing, ListingStatus};
use crate::policy::{Action, Parties, authorize};
use crate::record::fields;
use crate::repository::Repository;

const MAX_PLEDGE_ATTEMPTS: u32 = 5;

/// Records pledges and keeps each listing's funding totals in step with them.
pub struct InvestmentLedger<S: DocumentStore> {
    investments: Repository<S, Investment>,
    listings: Repository<S, BusinessListing>,
}

impl<S: DocumentStore + Clone> InvestmentLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            investments: Repository::new(store.clone()),
            listings: Repository::new(store),
        }
    }
}

impl<S: DocumentStore> InvestmentLedger<S> {
    /// Records a pledge and adds it to the listing's `funding_raised` and
    /// `investor_count` in the same atomic write.
    ///
    /// The listing update is conditional on the version that was read, so
    /// concurrent pledges retry instead of overwriting each other.
    #[tracing::instrument(skip(self, new), fields(user_id = %caller.user_id, business_id = %new.business_id))]
    pub async fn pledge(
        &self,
        caller: &Caller,
        new: NewInvestment,
    ) -> Result<Investment, DomainError> {
        authorize(caller, Action::CreateInvestment, &Parties::none())?;
        if !new.amount.is_positive() {
            return Err(DomainError::validation("Investment amount must be positive"));
        }

        for attempt in 1..=MAX_PLEDGE_ATTEMPTS {
            let current = self.listings.require_versioned(new.business_id).await?;
            let listing = &current.record;

            if !listing.status.can_receive_investments() {
                return Err(DomainError::invalid_state(
                    "Cannot invest in a non-active business",
                ));
            }
            if listing.funding_target.is_none() {
                return Err(DomainError::invalid_state(
                    "This business is not open for investments",
                ));
            }
            let raised = listing
                .funding_raised
                .checked_add(new.amount)
                .ok_or_else(|| DomainError::validation("Investment amount is too large"))?;

            let now = Utc::now();
            let investment = Investment {
                id: InvestmentId::new(),
                business_id: listing.id,
                investor_id: caller.user_id,
                amount: new.amount,
                created_at: now,
            };
            let totals = fields(json!({
                "funding_raised": raised,
                "investor_count": listing.investor_count + 1,
                "updated_at": now,
            }));
            let batch = WriteBatch::new()
                .push(Repository::<S, Investment>::insert_op(&investment)?)
                .push(Repository::<S, BusinessListing>::patch_op(
                    listing.id,
                    totals,
                    Precondition::expect_version(current.version)
                        .and_field_in("status", [ListingStatus::Active.as_str()]),
                ));

            match self.investments.store().commit(batch).await {
                Ok(_) => {
                    tracing::info!(
                        investment_id = %investment.id,
                        amount = %investment.amount,
                        "Investment pledged"
                    );
                    metrics::counter!("investments_pledged_total").increment(1);
                    return Ok(investment);
                }
                Err(e) if Repository::<S, BusinessListing>::is_conflict_on(&e, listing.id) => {
                    tracing::debug!(attempt, "Listing changed during pledge, retrying");
                    metrics::counter!("investment_pledge_conflicts_total").increment(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::invalid_state(
            "The business is receiving many investments right now, please retry",
        ))
    }

    pub async fn list_for_investor(&self, caller: &Caller) -> Result<Vec<Investment>, DomainError> {
        let query = Repository::<S, Investment>::query()
            .eq("investor_id", serde_json::to_value(caller.user_id)?)
            .newest_first();
        self.investments.find(query).await
    }

    pub async fn list_for_listing(
        &self,
        caller: &Caller,
        business_id: ListingId,
    ) -> Result<Vec<Investment>, DomainError> {
        let listing = self.listings.require(business_id).await?;
        authorize(caller, Action::ViewListingInvestments, &listing.parties())?;

        let query = Repository::<S, Investment>::query()
            .eq("business_id", serde_json::to_value(business_id)?)
            .newest_first();
        self.investments.find(query).await
    }

    pub async fn get(&self, caller: &Caller, id: InvestmentId) -> Result<Investment, DomainError> {
        let investment = self.investments.require(id).await?;
        let mut parties = Parties::none().investor(investment.investor_id);
        if let Some(listing) = self.listings.get(investment.business_id).await? {
            parties = parties.seller(listing.seller_id);
        }
        authorize(caller, Action::ViewInvestment, &parties)?;
        Ok(investment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use crate::listing::{ListingService, NewListing};
    use crate::money::Money;
    use common::UserId;
    use document_store::InMemoryDocumentStore;

    async fn active_listing(
        store: &InMemoryDocumentStore,
        target: Option<Money>,
    ) -> (Caller, BusinessListing) {
        let listings = ListingService::new(store.clone());
        let seller = Caller::new(UserId::new(), Role::Seller);
        let listing = listings
            .create(
                &seller,
                NewListing {
                    title: "Laundromat".into(),
                    industry: "Services".into(),
                    location: "Tampa, FL".into(),
                    funding_target: target,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let listing = listings.publish(&seller, listing.id).await.unwrap();
        (seller, listing)
    }

    fn investor() -> Caller {
        Caller::new(UserId::new(), Role::Investor)
    }

    #[tokio::test]
    async fn pledge_updates_listing_totals() {
        let store = InMemoryDocumentStore::new();
        let (_, listing) = active_listing(&store, Some(Money::from_dollars(100_000))).await;
        let ledger = InvestmentLedger::new(store.clone());

        for _ in 0..2 {
            ledger
                .pledge(
                    &investor(),
                    NewInvestment {
                        business_id: listing.id,
                        amount: Money::from_dollars(5_000),
                    },
                )
                .await
                .unwrap();
        }

        let listing = ListingService::new(store).get(listing.id).await.unwrap();
        assert_eq!(listing.funding_raised, Money::from_dollars(10_000));
        assert_eq!(listing.investor_count, 2);
    }

    #[tokio::test]
    async fn pledge_requires_funding_target() {
        let store = InMemoryDocumentStore::new();
        let (_, listing) = active_listing(&store, None).await;
        let ledger = InvestmentLedger::new(store);

        let result = ledger
            .pledge(
                &investor(),
                NewInvestment {
                    business_id: listing.id,
                    amount: Money::from_dollars(1),
                },
            )
            .await;
        match result {
            Err(DomainError::InvalidState(msg)) => {
                assert_eq!(msg, "This business is not open for investments")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn pledge_rejected_once_listing_is_under_loi() {
        let store = InMemoryDocumentStore::new();
        let (_, listing) = active_listing(&store, Some(Money::from_dollars(100_000))).await;
        Repository::<_, BusinessListing>::new(store.clone())
            .patch(
                listing.id,
                BusinessListing::status_fields(ListingStatus::UnderLoi, Utc::now()),
                Precondition::none(),
            )
            .await
            .unwrap();

        let ledger = InvestmentLedger::new(store);
        let result = ledger
            .pledge(
                &investor(),
                NewInvestment {
                    business_id: listing.id,
                    amount: Money::from_dollars(1),
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[tokio::test]
    async fn buyers_cannot_pledge() {
        let store = InMemoryDocumentStore::new();
        let (_, listing) = active_listing(&store, Some(Money::from_dollars(100_000))).await;
        let ledger = InvestmentLedger::new(store);

        let buyer = Caller::new(UserId::new(), Role::Buyer);
        let result = ledger
            .pledge(
                &buyer,
                NewInvestment {
                    business_id: listing.id,
                    amount: Money::from_dollars(1),
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn investments_visible_to_investor_and_seller_only() {
        let store = InMemoryDocumentStore::new();
        let (seller, listing) = active_listing(&store, Some(Money::from_dollars(100_000))).await;
        let ledger = InvestmentLedger::new(store);
        let investor = investor();

        let investment = ledger
            .pledge(
                &investor,
                NewInvestment {
                    business_id: listing.id,
                    amount: Money::from_dollars(2_500),
                },
            )
            .await
            .unwrap();

        assert!(ledger.get(&investor, investment.id).await.is_ok());
        assert!(ledger.get(&seller, investment.id).await.is_ok());
        assert!(matches!(
            ledger.get(&Caller::new(UserId::new(), Role::Investor), investment.id).await,
            Err(DomainError::Forbidden(_))
        ));

        assert_eq!(ledger.list_for_investor(&investor).await.unwrap().len(), 1);
        assert_eq!(
            ledger
                .list_for_listing(&seller, listing.id)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(ledger.list_for_listing(&investor, listing.id).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_pledges_are_all_counted() {
        let store = InMemoryDocumentStore::new();
        let (_, listing) = active_listing(&store, Some(Money::from_dollars(100_000))).await;
        let ledger = std::sync::Arc::new(InvestmentLedger::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let ledger = ledger.clone();
            let business_id = listing.id;
            handles.push(tokio::spawn(async move {
                ledger
                    .pledge(
                        &investor(),
                        NewInvestment {
                            business_id,
                            amount: Money::from_dollars(100),
                        },
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let listing = ListingService::new(store).get(listing.id).await.unwrap();
        assert_eq!(listing.funding_raised, Money::from_dollars(400));
        assert_eq!(listing.investor_count, 4);
    }
}
