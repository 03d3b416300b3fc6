//! Listing registry.

use chrono::Utc;
use common::{ListingId, OfferId, UserId};
use document_store::{DocumentStore, Precondition, WriteBatch};

use super::{
    BusinessListing, DEFAULT_FEATURED, ListingFilter, ListingStatus, ListingUpdate, MAX_FEATURED,
    NewListing,
};
use crate::error::DomainError;
use crate::identity::Caller;
use crate::offer::{Offer, OfferStatus};
use crate::policy::{Action, Parties, authorize};
use crate::record::Record;
use crate::repository::Repository;

/// Creates, edits, publishes and searches business listings.
///
/// Status changes past `active` are not made here; they belong to the offer
/// and deal workflow.
pub struct ListingService<S: DocumentStore> {
    listings: Repository<S, BusinessListing>,
    offers: Repository<S, Offer>,
}

const MAX_DELETE_ATTEMPTS: u32 = 3;
const CANNOT_DELETE: &str = "A listing with an accepted offer cannot be deleted";

impl<S: DocumentStore + Clone> ListingService<S> {
    pub fn new(store: S) -> Self {
        Self {
            listings: Repository::new(store.clone()),
            offers: Repository::new(store),
        }
    }
}

impl<S: DocumentStore> ListingService<S> {
    pub fn repository(&self) -> &Repository<S, BusinessListing> {
        &self.listings
    }

    #[tracing::instrument(skip(self, new), fields(user_id = %caller.user_id))]
    pub async fn create(
        &self,
        caller: &Caller,
        new: NewListing,
    ) -> Result<BusinessListing, DomainError> {
        authorize(caller, Action::CreateListing, &Parties::none())?;
        new.validate()?;

        let listing = BusinessListing::draft(caller.user_id, new, Utc::now());
        let listing = self.listings.insert(&listing).await?;

        tracing::info!(listing_id = %listing.id, "Listing created");
        metrics::counter!("listings_created_total").increment(1);
        Ok(listing)
    }

    pub async fn get(&self, id: ListingId) -> Result<BusinessListing, DomainError> {
        self.listings.require(id).await
    }

    #[tracing::instrument(skip(self, update), fields(user_id = %caller.user_id))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: ListingId,
        update: ListingUpdate,
    ) -> Result<BusinessListing, DomainError> {
        let listing = self.listings.require(id).await?;
        authorize(caller, Action::UpdateListing, &listing.parties())?;
        if !listing.status.can_edit() {
            return Err(DomainError::invalid_state(
                "Listing can no longer be edited",
            ));
        }

        let patch = update.into_patch(Utc::now())?;
        self.listings
            .patch(id, patch, editable())
            .await
            .map_err(|e| e.on_conflict("Listing can no longer be edited"))
    }

    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn publish(
        &self,
        caller: &Caller,
        id: ListingId,
    ) -> Result<BusinessListing, DomainError> {
        let listing = self.listings.require(id).await?;
        authorize(caller, Action::PublishListing, &listing.parties())?;
        if !listing.status.can_publish() {
            return Err(DomainError::invalid_state("Listing is already published"));
        }

        let published = self
            .listings
            .patch(
                id,
                BusinessListing::status_fields(ListingStatus::Active, Utc::now()),
                Precondition::field_in("status", [ListingStatus::Draft.as_str()]),
            )
            .await
            .map_err(|e| e.on_conflict("Listing is already published"))?;

        tracing::info!(listing_id = %id, "Listing published");
        Ok(published)
    }

    /// Deletes a listing that has not entered a letter of intent.
    ///
    /// Offers still pending on it are rejected in the same batch, so no
    /// buyer is left waiting on a listing that is gone.
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn delete(&self, caller: &Caller, id: ListingId) -> Result<(), DomainError> {
        let listing = self.listings.require(id).await?;
        authorize(caller, Action::DeleteListing, &listing.parties())?;
        if !listing.status.can_edit() {
            return Err(DomainError::invalid_state(CANNOT_DELETE));
        }

        for attempt in 1..=MAX_DELETE_ATTEMPTS {
            let pending = self.pending_offers(id).await?;
            let now = Utc::now();
            let mut batch = WriteBatch::new().push(Repository::<S, BusinessListing>::delete_op(
                id,
                editable(),
            ));
            batch.extend(pending.iter().map(|offer| {
                Repository::<S, Offer>::patch_op(
                    *offer,
                    Offer::status_fields(OfferStatus::Rejected, now),
                    Precondition::field_in("status", [OfferStatus::Pending.as_str()]),
                )
            }));

            match self.listings.store().commit(batch).await {
                Ok(_) => {
                    // A submission that committed after the lookup above is
                    // still pending. None can commit from here on.
                    let stragglers = self.reject_pending(id).await?;
                    let rejected = pending.len() + stragglers;
                    tracing::info!(listing_id = %id, rejected, "Listing deleted");
                    if rejected > 0 {
                        metrics::counter!("offers_rejected_total").increment(rejected as u64);
                    }
                    return Ok(());
                }
                Err(e) if Repository::<S, BusinessListing>::is_conflict_on(&e, id) => {
                    return Err(DomainError::invalid_state(CANNOT_DELETE));
                }
                Err(e) if e.failed_precondition().is_some() => {
                    tracing::debug!(attempt, "An offer changed during listing deletion, retrying");
                }
                Err(document_store::DocumentStoreError::NotFound { ref collection, .. })
                    if collection == BusinessListing::COLLECTION =>
                {
                    return Err(DomainError::not_found(BusinessListing::KIND, id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::invalid_state(
            "The listing's offers are changing right now, please retry",
        ))
    }

    async fn pending_offers(&self, id: ListingId) -> Result<Vec<OfferId>, DomainError> {
        let query = Repository::<S, Offer>::query()
            .eq("business_id", serde_json::to_value(id)?)
            .eq("status", OfferStatus::Pending.as_str());
        Ok(self.offers.find(query).await?.into_iter().map(|o| o.id).collect())
    }

    async fn reject_pending(&self, id: ListingId) -> Result<usize, DomainError> {
        let mut rejected = 0;
        for offer in self.pending_offers(id).await? {
            let result = self
                .offers
                .patch(
                    offer,
                    Offer::status_fields(OfferStatus::Rejected, Utc::now()),
                    Precondition::field_in("status", [OfferStatus::Pending.as_str()]),
                )
                .await;
            match result {
                Ok(_) => rejected += 1,
                Err(DomainError::Store(e)) if e.failed_precondition().is_some() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(rejected)
    }

    pub async fn search(&self, filter: &ListingFilter) -> Result<Vec<BusinessListing>, DomainError> {
        self.listings.find(filter.to_query()?).await
    }

    /// Active listings with the most funding raised.
    pub async fn featured(&self, limit: Option<usize>) -> Result<Vec<BusinessListing>, DomainError> {
        let limit = limit.unwrap_or(DEFAULT_FEATURED);
        if !(1..=MAX_FEATURED).contains(&limit) {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {MAX_FEATURED}"
            )));
        }
        let query = Repository::<S, BusinessListing>::query()
            .eq("status", ListingStatus::Active.as_str())
            .sort_by("funding_raised", true)
            .limit(limit);
        self.listings.find(query).await
    }

    pub async fn by_seller(&self, seller_id: UserId) -> Result<Vec<BusinessListing>, DomainError> {
        let query = Repository::<S, BusinessListing>::query()
            .eq("seller_id", serde_json::to_value(seller_id)?)
            .newest_first();
        self.listings.find(query).await
    }
}

fn editable() -> Precondition {
    Precondition::field_in("status", ListingStatus::open_statuses())
}

impl BusinessListing {
    /// Parties used by the authorization policy.
    pub fn parties(&self) -> Parties {
        Parties::none().seller(self.seller_id)
    }
}
