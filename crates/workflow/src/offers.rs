//! Offer submission, acceptance and rejection.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use common::{ListingId, OfferId};
use document_store::{DocumentStore, DocumentStoreError, Precondition, WriteBatch};
use domain::{
    Action, BusinessListing, Caller, Deal, DomainError, ListingStatus, NewOffer, Offer,
    OfferStatus, Parties, Record, Repository, TimelineEvent, authorize, deal_id_for_offer,
};

use crate::config::{SiblingOfferPolicy, WorkflowConfig};
use crate::error::{Result, WorkflowError};
use crate::views::OfferView;

const CANNOT_ACCEPT: &str = "This offer cannot be accepted";
const CANNOT_REJECT: &str = "This offer cannot be rejected";
const UNDER_LOI: &str = "This business is already under a letter of intent";
const LISTING_CLOSED: &str = "This business listing is closed";
const NOT_PUBLISHED: &str = "This business listing is not yet published";

/// Drives offers from submission to a decision.
///
/// Accepting an offer writes the listing, the offer, the new deal and its
/// first timeline event in one batch. The listing write only applies while
/// the listing is still `draft` or `active`, so of several concurrent
/// acceptances on one listing exactly one commits. Submitting an offer
/// re-checks in its own batch that the listing is still `active`.
pub struct OfferWorkflow<S: DocumentStore> {
    offers: Repository<S, Offer>,
    listings: Repository<S, BusinessListing>,
    deals: Repository<S, Deal>,
    config: WorkflowConfig,
}

impl<S: DocumentStore + Clone> OfferWorkflow<S> {
    pub fn new(store: S, config: WorkflowConfig) -> Self {
        Self {
            offers: Repository::new(store.clone()),
            listings: Repository::new(store.clone()),
            deals: Repository::new(store),
            config,
        }
    }
}

impl<S: DocumentStore> OfferWorkflow<S> {
    #[tracing::instrument(skip(self, new), fields(user_id = %caller.user_id, listing_id = %new.business_id))]
    pub async fn submit(&self, caller: &Caller, new: NewOffer) -> Result<Offer> {
        self.config
            .bounded("submit_offer", self.submit_inner(caller, new))
            .await
    }

    async fn submit_inner(&self, caller: &Caller, new: NewOffer) -> Result<Offer> {
        authorize(caller, Action::SubmitOffer, &Parties::none()).map_err(DomainError::from)?;

        let listing = self.listings.require(new.business_id).await?;
        if let Some(reason) = closed_to_offers(listing.status) {
            return Err(WorkflowError::invalid_state(reason));
        }

        // The listing check is repeated inside the batch, so an acceptance
        // committing in between turns this submission away.
        let offer = Offer::submit(caller.user_id, new, Utc::now())?;
        let batch = WriteBatch::new()
            .push(Repository::<S, BusinessListing>::check_op(
                listing.id,
                Precondition::field_in("status", [ListingStatus::Active.as_str()]),
            ))
            .push(Repository::<S, Offer>::insert_op(&offer)?);

        let written = match self.offers.store().commit(batch).await {
            Ok(written) => written,
            Err(e) if Repository::<S, BusinessListing>::is_conflict_on(&e, listing.id) => {
                tracing::debug!(listing_id = %listing.id, "Listing left active during submission");
                let status = self.listings.require(listing.id).await?.status;
                let reason = closed_to_offers(status).unwrap_or(UNDER_LOI);
                return Err(WorkflowError::invalid_state(reason));
            }
            Err(DocumentStoreError::NotFound { ref collection, .. })
                if collection == BusinessListing::COLLECTION =>
            {
                return Err(DomainError::not_found(BusinessListing::KIND, listing.id).into());
            }
            Err(e) => return Err(e.into()),
        };
        let offer = match written.first() {
            Some(doc) => Repository::<S, Offer>::decode(doc)?,
            None => return Err(DomainError::not_found(Offer::KIND, offer.id).into()),
        };

        tracing::info!(offer_id = %offer.id, amount = %offer.offer_amount, "Offer submitted");
        metrics::counter!("offers_submitted_total").increment(1);
        Ok(offer)
    }

    /// Loads an offer with its listing. Visible to the buyer, the listing's
    /// seller and admins.
    pub async fn get(&self, caller: &Caller, id: OfferId) -> Result<OfferView> {
        self.config.bounded("get_offer", self.get_inner(caller, id)).await
    }

    async fn get_inner(&self, caller: &Caller, id: OfferId) -> Result<OfferView> {
        let offer = self.offers.require(id).await?;
        let business = self.listings.get(offer.business_id).await?;
        let mut parties = Parties::none().buyer(offer.buyer_id);
        if let Some(listing) = &business {
            parties = parties.seller(listing.seller_id);
        }
        authorize(caller, Action::ViewOffer, &parties).map_err(DomainError::from)?;
        Ok(OfferView { offer, business })
    }

    /// Offers the caller made, newest first.
    pub async fn list_for_buyer(&self, caller: &Caller) -> Result<Vec<OfferView>> {
        self.config
            .bounded("list_buyer_offers", self.list_for_buyer_inner(caller))
            .await
    }

    async fn list_for_buyer_inner(&self, caller: &Caller) -> Result<Vec<OfferView>> {
        let buyer = serde_json::to_value(caller.user_id).map_err(DomainError::from)?;
        let query = Repository::<S, Offer>::query()
            .eq("buyer_id", buyer)
            .newest_first();
        let offers = self.offers.find(query).await?;
        self.with_listings(offers).await
    }

    /// Offers received on any of the caller's listings, newest first.
    pub async fn list_for_seller(&self, caller: &Caller) -> Result<Vec<OfferView>> {
        self.config
            .bounded("list_seller_offers", self.list_for_seller_inner(caller))
            .await
    }

    async fn list_for_seller_inner(&self, caller: &Caller) -> Result<Vec<OfferView>> {
        let seller = serde_json::to_value(caller.user_id).map_err(DomainError::from)?;
        let query = Repository::<S, BusinessListing>::query().eq("seller_id", seller);
        let listings = self.listings.find(query).await?;
        if listings.is_empty() {
            return Ok(Vec::new());
        }

        let ids = listings
            .iter()
            .map(|l| serde_json::to_value(l.id))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DomainError::from)?;
        let query = Repository::<S, Offer>::query()
            .one_of("business_id", ids)
            .newest_first();
        let offers = self.offers.find(query).await?;

        let by_id: HashMap<ListingId, BusinessListing> =
            listings.into_iter().map(|l| (l.id, l)).collect();
        Ok(offers
            .into_iter()
            .map(|offer| OfferView {
                business: by_id.get(&offer.business_id).cloned(),
                offer,
            })
            .collect())
    }

    /// Accepts a pending offer and opens its deal.
    ///
    /// Fails with `InvalidState` if the offer is no longer pending or the
    /// listing is already under a letter of intent, including when another
    /// acceptance wins a race for the same listing. Nothing is written in
    /// that case.
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn accept(&self, caller: &Caller, id: OfferId) -> Result<Deal> {
        self.config
            .bounded("accept_offer", self.accept_inner(caller, id))
            .await
    }

    async fn accept_inner(&self, caller: &Caller, id: OfferId) -> Result<Deal> {
        let attempts = self.config.max_conflict_retries + 1;

        for attempt in 1..=attempts {
            let offer = self.offers.require(id).await?;
            let listing = self.listings.require(offer.business_id).await?;
            authorize(caller, Action::AcceptOffer, &listing.parties())
                .map_err(DomainError::from)?;

            if !offer.status.can_accept() {
                if offer.status == OfferStatus::Accepted {
                    self.check_deal_exists(&offer).await?;
                }
                return Err(WorkflowError::invalid_state(CANNOT_ACCEPT));
            }
            match listing.status {
                status if status.can_enter_loi() => {}
                ListingStatus::Closed => return Err(WorkflowError::invalid_state(LISTING_CLOSED)),
                _ => return Err(WorkflowError::invalid_state(UNDER_LOI)),
            }

            let siblings = self.pending_siblings(&offer).await?;
            let now = Utc::now();
            let deal = Deal::open(&offer, &listing, now);
            let event = TimelineEvent::offer_accepted(deal.id, offer.offer_amount, now);

            // The listing goes first: every write touching a listing's offers
            // takes the listing row before any offer row.
            let mut batch = WriteBatch::new()
                .push(Repository::<S, BusinessListing>::patch_op(
                    listing.id,
                    BusinessListing::status_fields(ListingStatus::UnderLoi, now),
                    Precondition::field_in("status", ListingStatus::open_statuses()),
                ))
                .push(Repository::<S, Offer>::patch_op(
                    offer.id,
                    Offer::status_fields(OfferStatus::Accepted, now),
                    pending(),
                ))
                .push(Repository::<S, Deal>::insert_op(&deal)?)
                .push(Repository::<S, TimelineEvent>::insert_op(&event)?);

            let reject_siblings = self.config.sibling_policy == SiblingOfferPolicy::RejectSiblings;
            if reject_siblings {
                batch.extend(siblings.iter().map(|sibling| {
                    Repository::<S, Offer>::patch_op(
                        *sibling,
                        Offer::status_fields(OfferStatus::Rejected, now),
                        pending(),
                    )
                }));
            }

            match self.offers.store().commit(batch).await {
                Ok(_) => {
                    tracing::info!(
                        offer_id = %offer.id,
                        listing_id = %listing.id,
                        deal_id = %deal.id,
                        "Offer accepted, deal opened"
                    );
                    metrics::counter!("offers_accepted_total").increment(1);
                    if !siblings.is_empty() {
                        if reject_siblings {
                            tracing::info!(count = siblings.len(), "Rejected sibling offers");
                            metrics::counter!("offers_rejected_total").increment(siblings.len() as u64);
                        } else {
                            tracing::info!(
                                count = siblings.len(),
                                listing_id = %listing.id,
                                "Sibling offers left pending on a listing under LOI"
                            );
                            metrics::counter!("offers_stale_siblings_total")
                                .increment(siblings.len() as u64);
                        }
                    }
                    return Ok(deal);
                }
                Err(e) if Repository::<S, Offer>::is_conflict_on(&e, offer.id) => {
                    metrics::counter!("offer_accept_conflicts_total").increment(1);
                    return Err(WorkflowError::invalid_state(CANNOT_ACCEPT));
                }
                Err(e) if Repository::<S, BusinessListing>::is_conflict_on(&e, listing.id) => {
                    tracing::debug!(offer_id = %offer.id, "Lost the race for the listing");
                    metrics::counter!("offer_accept_conflicts_total").increment(1);
                    return Err(WorkflowError::invalid_state(UNDER_LOI));
                }
                Err(DocumentStoreError::AlreadyExists { ref collection, .. })
                    if collection == Deal::COLLECTION =>
                {
                    metrics::counter!("offer_accept_conflicts_total").increment(1);
                    return Err(WorkflowError::invalid_state(CANNOT_ACCEPT));
                }
                Err(DocumentStoreError::PreconditionFailed { ref collection, .. })
                    if reject_siblings && collection == Offer::COLLECTION =>
                {
                    tracing::debug!(attempt, "A sibling offer changed during acceptance, retrying");
                }
                Err(e) if e.is_contention() => {
                    tracing::debug!(attempt, error = %e, "Acceptance aborted by contention, retrying");
                    metrics::counter!("offer_accept_contention_total").increment(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(WorkflowError::invalid_state(
            "The listing's offers are changing right now, please retry",
        ))
    }

    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn reject(&self, caller: &Caller, id: OfferId) -> Result<Offer> {
        self.config
            .bounded("reject_offer", self.reject_inner(caller, id))
            .await
    }

    async fn reject_inner(&self, caller: &Caller, id: OfferId) -> Result<Offer> {
        let offer = self.offers.require(id).await?;
        let listing = self.listings.require(offer.business_id).await?;
        authorize(caller, Action::RejectOffer, &listing.parties()).map_err(DomainError::from)?;
        if !offer.status.can_reject() {
            return Err(WorkflowError::invalid_state(CANNOT_REJECT));
        }

        let rejected = self
            .offers
            .patch(
                id,
                Offer::status_fields(OfferStatus::Rejected, Utc::now()),
                pending(),
            )
            .await
            .map_err(|e| e.on_conflict(CANNOT_REJECT))?;

        tracing::info!(offer_id = %id, "Offer rejected");
        metrics::counter!("offers_rejected_total").increment(1);
        Ok(rejected)
    }

    /// Other pending offers on the same listing.
    async fn pending_siblings(&self, offer: &Offer) -> Result<Vec<OfferId>> {
        let query = Repository::<S, Offer>::query()
            .eq(
                "business_id",
                serde_json::to_value(offer.business_id).map_err(DomainError::from)?,
            )
            .eq("status", OfferStatus::Pending.as_str());
        Ok(self
            .offers
            .find(query)
            .await?
            .into_iter()
            .map(|o| o.id)
            .filter(|sibling| *sibling != offer.id)
            .collect())
    }

    /// An accepted offer must have its deal. Reports the gap when it does not.
    async fn check_deal_exists(&self, offer: &Offer) -> Result<()> {
        let deal_id = deal_id_for_offer(offer.id);
        if self.deals.get(deal_id).await?.is_none() {
            tracing::error!(
                offer_id = %offer.id,
                deal_id = %deal_id,
                "Offer is accepted but has no deal; run reconciliation"
            );
            metrics::counter!("workflow_inconsistencies_total", "kind" => "accepted_offer_without_deal")
                .increment(1);
        }
        Ok(())
    }

    async fn with_listings(&self, offers: Vec<Offer>) -> Result<Vec<OfferView>> {
        let ids: BTreeSet<ListingId> = offers.iter().map(|o| o.business_id).collect();
        let mut by_id = HashMap::new();
        if !ids.is_empty() {
            let values = ids
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(DomainError::from)?;
            let query = Repository::<S, BusinessListing>::query().one_of("id", values);
            for listing in self.listings.find(query).await? {
                by_id.insert(listing.id, listing);
            }
        }
        Ok(offers
            .into_iter()
            .map(|offer| OfferView {
                business: by_id.get(&offer.business_id).cloned(),
                offer,
            })
            .collect())
    }
}

/// Why a listing in `status` cannot take new offers, if it cannot.
fn closed_to_offers(status: ListingStatus) -> Option<&'static str> {
    match status {
        ListingStatus::Active => None,
        ListingStatus::UnderLoi => Some(UNDER_LOI),
        ListingStatus::Closed => Some(LISTING_CLOSED),
        ListingStatus::Draft => Some(NOT_PUBLISHED),
    }
}

fn pending() -> Precondition {
    Precondition::field_in("status", [OfferStatus::Pending.as_str()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use document_store::InMemoryDocumentStore;
    use domain::{ListingService, Money, NewListing, Role};

    struct Fixture {
        workflow: OfferWorkflow<InMemoryDocumentStore>,
        listings: ListingService<InMemoryDocumentStore>,
        seller: Caller,
        listing: BusinessListing,
    }

    async fn fixture(policy: SiblingOfferPolicy) -> Fixture {
        let store = InMemoryDocumentStore::new();
        let listings = ListingService::new(store.clone());
        let seller = Caller::new(UserId::new(), Role::Seller);
        let listing = listings
            .create(
                &seller,
                NewListing {
                    title: "Corner Bakery".into(),
                    industry: "Food".into(),
                    location: "Austin, TX".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let listing = listings.publish(&seller, listing.id).await.unwrap();
        let workflow = OfferWorkflow::new(
            store,
            WorkflowConfig::default().with_sibling_policy(policy),
        );
        Fixture {
            workflow,
            listings,
            seller,
            listing,
        }
    }

    fn buyer() -> Caller {
        Caller::new(UserId::new(), Role::Buyer)
    }

    impl Fixture {
        async fn offer(&self, dollars: i64) -> Offer {
            self.workflow
                .submit(
                    &buyer(),
                    NewOffer::new(self.listing.id, Money::from_dollars(dollars)),
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn sellers_cannot_submit_offers() {
        let f = fixture(SiblingOfferPolicy::LeavePending).await;
        let result = f
            .workflow
            .submit(&f.seller, NewOffer::new(f.listing.id, Money::from_dollars(1)))
            .await;
        match result {
            Err(WorkflowError::Domain(DomainError::Forbidden(msg))) => {
                assert_eq!(msg, "Only buyers can make offers")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn draft_listing_does_not_take_offers() {
        let f = fixture(SiblingOfferPolicy::LeavePending).await;
        let draft = f
            .listings
            .create(
                &f.seller,
                NewListing {
                    title: "Unpublished".into(),
                    industry: "Retail".into(),
                    location: "Reno, NV".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let result = f
            .workflow
            .submit(&buyer(), NewOffer::new(draft.id, Money::from_dollars(10)))
            .await;
        match result {
            Err(WorkflowError::Domain(DomainError::InvalidState(msg))) => {
                assert_eq!(msg, NOT_PUBLISHED)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn leave_pending_keeps_siblings() {
        let f = fixture(SiblingOfferPolicy::LeavePending).await;
        let winner = f.offer(900_000).await;
        let sibling = f.offer(800_000).await;

        f.workflow.accept(&f.seller, winner.id).await.unwrap();

        let sibling = f.workflow.get(&f.seller, sibling.id).await.unwrap();
        assert_eq!(sibling.offer.status, OfferStatus::Pending);
    }

    #[tokio::test]
    async fn reject_policy_rejects_siblings_with_the_acceptance() {
        let f = fixture(SiblingOfferPolicy::RejectSiblings).await;
        let winner = f.offer(900_000).await;
        let sibling = f.offer(800_000).await;

        f.workflow.accept(&f.seller, winner.id).await.unwrap();

        let sibling = f.workflow.get(&f.seller, sibling.id).await.unwrap();
        assert_eq!(sibling.offer.status, OfferStatus::Rejected);
        let winner = f.workflow.get(&f.seller, winner.id).await.unwrap();
        assert_eq!(winner.offer.status, OfferStatus::Accepted);
    }

    #[tokio::test]
    async fn reject_is_final() {
        let f = fixture(SiblingOfferPolicy::LeavePending).await;
        let offer = f.offer(500_000).await;

        let rejected = f.workflow.reject(&f.seller, offer.id).await.unwrap();
        assert_eq!(rejected.status, OfferStatus::Rejected);

        for result in [
            f.workflow.reject(&f.seller, offer.id).await.map(|_| ()),
            f.workflow.accept(&f.seller, offer.id).await.map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(WorkflowError::Domain(DomainError::InvalidState(_)))
            ));
        }
    }

    #[tokio::test]
    async fn seller_sees_offers_on_own_listings_only() {
        let f = fixture(SiblingOfferPolicy::LeavePending).await;
        f.offer(100_000).await;
        f.offer(200_000).await;

        let mine = f.workflow.list_for_seller(&f.seller).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].offer.offer_amount, Money::from_dollars(200_000));
        assert_eq!(mine[0].business.as_ref().map(|b| b.id), Some(f.listing.id));

        let stranger = Caller::new(UserId::new(), Role::Seller);
        assert!(f.workflow.list_for_seller(&stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unrelated_caller_cannot_view_offer() {
        let f = fixture(SiblingOfferPolicy::LeavePending).await;
        let offer = f.offer(100_000).await;

        let result = f.workflow.get(&buyer(), offer.id).await;
        assert!(matches!(
            result,
            Err(WorkflowError::Domain(DomainError::Forbidden(_)))
        ));
    }
}
