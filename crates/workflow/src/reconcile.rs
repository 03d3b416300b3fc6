//! Detection and repair of records that disagree with each other.
//!
//! Offer acceptance and deal completion are single atomic writes, so these
//! states only arise from data written by older releases, manual edits or
//! imports. The reconciler brings them back in line:
//!
//! - an accepted offer without a deal gets its deal (and "Offer Accepted"
//!   event) and its listing moves under a letter of intent
//! - a listing of an in-progress deal that is still `draft`/`active` moves
//!   under a letter of intent
//! - a listing of a completed deal is closed
//! - a listing whose `under_loi` flag disagrees with its status gets the flag
//!   rewritten
//!
//! Every repair is conditional on the state it was decided from, and the
//! derived deal id makes recreating a deal idempotent. Anything it cannot
//! repair safely is reported as a conflict.

use chrono::Utc;
use document_store::{DocumentQuery, DocumentStore, DocumentStoreError, Precondition, WriteBatch};
use domain::{
    Action, BusinessListing, Caller, Deal, DealStatus, DomainError, ListingStatus, Offer,
    OfferStatus, Parties, Record, Repository, TimelineEvent, authorize, deal_id_for_offer,
};
use serde::Serialize;

use crate::error::Result;

const PAGE_SIZE: usize = 200;

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub offers_checked: usize,
    pub deals_checked: usize,
    pub deals_repaired: usize,
    pub listings_repaired: usize,
    /// Human readable descriptions of inconsistencies left in place.
    pub conflicts: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.deals_repaired == 0 && self.listings_repaired == 0 && self.conflicts.is_empty()
    }

    fn conflict(&mut self, message: String) {
        tracing::error!(conflict = %message, "Unrepairable workflow inconsistency");
        metrics::counter!("workflow_inconsistencies_total", "kind" => "unrepaired").increment(1);
        self.conflicts.push(message);
    }
}

pub struct Reconciler<S: DocumentStore> {
    offers: Repository<S, Offer>,
    listings: Repository<S, BusinessListing>,
    deals: Repository<S, Deal>,
}

impl<S: DocumentStore + Clone> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self {
            offers: Repository::new(store.clone()),
            listings: Repository::new(store.clone()),
            deals: Repository::new(store),
        }
    }
}

impl<S: DocumentStore> Reconciler<S> {
    /// Runs reconciliation on behalf of a caller. Admins only.
    pub async fn run_as(&self, caller: &Caller) -> Result<ReconcileReport> {
        authorize(caller, Action::RunReconciliation, &Parties::none())
            .map_err(DomainError::from)?;
        self.run().await
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        self.accepted_offers(&mut report).await?;
        self.deal_listings(&mut report).await?;
        self.loi_flags(&mut report).await?;

        if report.is_clean() {
            tracing::debug!(
                offers_checked = report.offers_checked,
                deals_checked = report.deals_checked,
                "Reconciliation found nothing to repair"
            );
        } else {
            tracing::warn!(
                deals_repaired = report.deals_repaired,
                listings_repaired = report.listings_repaired,
                conflicts = report.conflicts.len(),
                "Reconciliation finished with repairs"
            );
        }
        metrics::counter!("reconciliation_runs_total").increment(1);
        Ok(report)
    }

    async fn accepted_offers(&self, report: &mut ReconcileReport) -> Result<()> {
        let query = Repository::<S, Offer>::query().eq("status", OfferStatus::Accepted.as_str());
        let mut offset = 0;
        loop {
            let page = self.offers.find(page(&query, offset)).await?;
            for offer in &page {
                report.offers_checked += 1;
                if self.deals.get(deal_id_for_offer(offer.id)).await?.is_none() {
                    self.restore_deal(offer, report).await?;
                }
            }
            if page.len() < PAGE_SIZE {
                return Ok(());
            }
            offset += PAGE_SIZE;
        }
    }

    async fn restore_deal(&self, offer: &Offer, report: &mut ReconcileReport) -> Result<()> {
        let Some(listing) = self.listings.get(offer.business_id).await? else {
            report.conflict(format!(
                "Offer {} is accepted but its listing {} no longer exists",
                offer.id, offer.business_id
            ));
            return Ok(());
        };

        let moves_listing = listing.status.can_enter_loi();
        if !moves_listing {
            let query = Repository::<S, Deal>::query()
                .eq("business_id", serde_json::to_value(listing.id).map_err(DomainError::from)?);
            if !self.deals.find(query).await?.is_empty() {
                report.conflict(format!(
                    "Offer {} is accepted but listing {} already belongs to another deal",
                    offer.id, listing.id
                ));
                return Ok(());
            }
            if listing.status == ListingStatus::Closed {
                report.conflict(format!(
                    "Offer {} is accepted but listing {} was closed without a deal",
                    offer.id, listing.id
                ));
                return Ok(());
            }
        }

        let now = Utc::now();
        let deal = Deal::open(offer, &listing, now);
        let mut batch = WriteBatch::new();
        if moves_listing {
            batch = batch.push(Repository::<S, BusinessListing>::patch_op(
                listing.id,
                BusinessListing::status_fields(ListingStatus::UnderLoi, now),
                Precondition::field_in("status", [listing.status.as_str()]),
            ));
        }
        let batch = batch
            .push(Repository::<S, Deal>::insert_op(&deal)?)
            .push(Repository::<S, TimelineEvent>::insert_op(
                &TimelineEvent::offer_accepted(deal.id, offer.offer_amount, now),
            )?);

        match self.deals.store().commit(batch).await {
            Ok(_) => {
                tracing::warn!(
                    offer_id = %offer.id,
                    deal_id = %deal.id,
                    listing_id = %listing.id,
                    "Restored missing deal for accepted offer"
                );
                report.deals_repaired += 1;
                if moves_listing {
                    report.listings_repaired += 1;
                }
            }
            Err(DocumentStoreError::AlreadyExists { ref collection, .. })
                if collection == Deal::COLLECTION =>
            {
                tracing::debug!(offer_id = %offer.id, "Deal was restored concurrently");
            }
            Err(e) if e.failed_precondition().is_some() => {
                report.conflict(format!(
                    "Listing {} changed while restoring the deal of offer {}",
                    listing.id, offer.id
                ));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn deal_listings(&self, report: &mut ReconcileReport) -> Result<()> {
        let query = Repository::<S, Deal>::query();
        let mut offset = 0;
        loop {
            let page = self.deals.find(page(&query, offset)).await?;
            for deal in &page {
                report.deals_checked += 1;
                self.align_listing(deal, report).await?;
            }
            if page.len() < PAGE_SIZE {
                return Ok(());
            }
            offset += PAGE_SIZE;
        }
    }

    async fn align_listing(&self, deal: &Deal, report: &mut ReconcileReport) -> Result<()> {
        let Some(listing) = self.listings.get(deal.business_id).await? else {
            report.conflict(format!(
                "Deal {} refers to listing {} which no longer exists",
                deal.id, deal.business_id
            ));
            return Ok(());
        };

        let target = match (deal.status, listing.status) {
            (DealStatus::InProgress, ListingStatus::Draft | ListingStatus::Active) => {
                ListingStatus::UnderLoi
            }
            (DealStatus::Completed, ListingStatus::Draft | ListingStatus::Active | ListingStatus::UnderLoi) => {
                ListingStatus::Closed
            }
            (DealStatus::InProgress, ListingStatus::Closed) => {
                report.conflict(format!(
                    "Listing {} is closed but deal {} is still in progress",
                    listing.id, deal.id
                ));
                return Ok(());
            }
            _ => return Ok(()),
        };

        self.set_listing_status(&listing, target, report).await
    }

    async fn loi_flags(&self, report: &mut ReconcileReport) -> Result<()> {
        let flagged = Repository::<S, BusinessListing>::query().eq("under_loi", true);
        let under_loi =
            Repository::<S, BusinessListing>::query().eq("status", ListingStatus::UnderLoi.as_str());

        for query in [flagged, under_loi] {
            for listing in self.listings.find(query).await? {
                if listing.under_loi != (listing.status == ListingStatus::UnderLoi) {
                    self.set_listing_status(&listing, listing.status, report).await?;
                }
            }
        }
        Ok(())
    }

    /// Rewrites status and the derived `under_loi` flag, provided the
    /// listing still has the status it was read with.
    async fn set_listing_status(
        &self,
        listing: &BusinessListing,
        status: ListingStatus,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let result = self
            .listings
            .patch(
                listing.id,
                BusinessListing::status_fields(status, Utc::now()),
                Precondition::field_in("status", [listing.status.as_str()]),
            )
            .await;

        match result {
            Ok(_) => {
                tracing::warn!(
                    listing_id = %listing.id,
                    from = %listing.status,
                    to = %status,
                    "Repaired listing status"
                );
                report.listings_repaired += 1;
                Ok(())
            }
            Err(DomainError::Store(ref e)) if e.failed_precondition().is_some() => {
                report.conflict(format!(
                    "Listing {} changed while being repaired",
                    listing.id
                ));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn page(query: &DocumentQuery, offset: usize) -> DocumentQuery {
    query.clone().offset(offset).limit(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use document_store::{DocumentStoreExt, InMemoryDocumentStore};
    use domain::Role;

    #[tokio::test]
    async fn empty_store_is_clean() {
        let reconciler = Reconciler::new(InMemoryDocumentStore::new());
        let report = reconciler.run().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.offers_checked, 0);
    }

    #[tokio::test]
    async fn only_admins_trigger_runs() {
        let reconciler = Reconciler::new(InMemoryDocumentStore::new());
        let seller = Caller::new(UserId::new(), Role::Seller);
        assert!(reconciler.run_as(&seller).await.is_err());

        let admin = Caller::new(UserId::new(), Role::Admin);
        assert!(reconciler.run_as(&admin).await.is_ok());
    }

    #[tokio::test]
    async fn flag_mismatch_is_rewritten() {
        let store = InMemoryDocumentStore::new();
        let listing = serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "seller_id": uuid::Uuid::new_v4(),
            "title": "Flagged",
            "industry": "Retail",
            "location": "Omaha, NE",
            "funding_raised": 0,
            "investor_count": 0,
            "status": "active",
            "under_loi": true,
            "created_at": Utc::now(),
            "updated_at": Utc::now(),
        });
        let id = uuid::Uuid::parse_str(listing["id"].as_str().unwrap()).unwrap();
        store.insert("listings", id, listing).await.unwrap();

        let report = Reconciler::new(store.clone()).run().await.unwrap();
        assert_eq!(report.listings_repaired, 1);

        let doc = store.get("listings", id).await.unwrap().unwrap();
        assert_eq!(doc.body["under_loi"], false);
        assert_eq!(doc.body["status"], "active");
    }
}
