//! Deal timeline, documents and completion.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use common::{DealId, ListingId};
use document_store::{DocumentStore, DocumentStoreError, Precondition, WriteBatch};
use domain::{
    Action, BusinessListing, Caller, Deal, DealDocument, DealStatus, DomainError, ListingStatus,
    NewDealDocument, NewTimelineEvent, Record, Repository, TimelineEvent, authorize,
};

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::views::DealView;

const CANNOT_COMPLETE: &str = "This deal cannot be marked as completed";

/// Everything that happens to a deal after its offer was accepted.
///
/// Deals are never edited directly: their parties append timeline events
/// and documents, and the seller completes them.
pub struct DealWorkflow<S: DocumentStore> {
    deals: Repository<S, Deal>,
    listings: Repository<S, BusinessListing>,
    events: Repository<S, TimelineEvent>,
    documents: Repository<S, DealDocument>,
    config: WorkflowConfig,
}

impl<S: DocumentStore + Clone> DealWorkflow<S> {
    pub fn new(store: S, config: WorkflowConfig) -> Self {
        Self {
            deals: Repository::new(store.clone()),
            listings: Repository::new(store.clone()),
            events: Repository::new(store.clone()),
            documents: Repository::new(store),
            config,
        }
    }
}

impl<S: DocumentStore> DealWorkflow<S> {
    /// Loads a deal with its listing and timeline.
    pub async fn get(&self, caller: &Caller, id: DealId) -> Result<DealView> {
        self.config.bounded("get_deal", self.get_inner(caller, id)).await
    }

    async fn get_inner(&self, caller: &Caller, id: DealId) -> Result<DealView> {
        let deal = self.require_authorized(caller, id, Action::ViewDeal).await?;
        let mut views = self.with_details(vec![deal]).await?;
        views
            .pop()
            .ok_or_else(|| DomainError::not_found(Deal::KIND, id).into())
    }

    /// Deals the caller is a party to, newest first. Admins see every deal.
    pub async fn list_for_caller(&self, caller: &Caller) -> Result<Vec<DealView>> {
        self.config
            .bounded("list_deals", self.list_for_caller_inner(caller))
            .await
    }

    async fn list_for_caller_inner(&self, caller: &Caller) -> Result<Vec<DealView>> {
        let mut query = Repository::<S, Deal>::query().newest_first();
        if !caller.is_admin() {
            use document_store::Condition::Eq;

            let me = serde_json::to_value(caller.user_id).map_err(DomainError::from)?;
            query = query.any(vec![
                Eq {
                    field: "buyer_id".to_string(),
                    value: me.clone(),
                },
                Eq {
                    field: "seller_id".to_string(),
                    value: me,
                },
            ]);
        }
        let deals = self.deals.find(query).await?;
        self.with_details(deals).await
    }

    #[tracing::instrument(skip(self, new), fields(user_id = %caller.user_id))]
    pub async fn append_timeline(
        &self,
        caller: &Caller,
        id: DealId,
        new: NewTimelineEvent,
    ) -> Result<TimelineEvent> {
        self.config
            .bounded("append_timeline", self.append_timeline_inner(caller, id, new))
            .await
    }

    async fn append_timeline_inner(
        &self,
        caller: &Caller,
        id: DealId,
        new: NewTimelineEvent,
    ) -> Result<TimelineEvent> {
        let deal = self
            .require_authorized(caller, id, Action::AppendTimelineEvent)
            .await?;
        let event = TimelineEvent::reported(deal.id, new, Utc::now())?;
        let event = self.events.insert(&event).await?;

        tracing::info!(deal_id = %deal.id, event_type = %event.event_type, "Timeline event added");
        Ok(event)
    }

    /// Attaches a document and records a "Document Added" event for it in
    /// the same write.
    #[tracing::instrument(skip(self, new), fields(user_id = %caller.user_id))]
    pub async fn add_document(
        &self,
        caller: &Caller,
        id: DealId,
        new: NewDealDocument,
    ) -> Result<DealDocument> {
        self.config
            .bounded("add_document", self.add_document_inner(caller, id, new))
            .await
    }

    async fn add_document_inner(
        &self,
        caller: &Caller,
        id: DealId,
        new: NewDealDocument,
    ) -> Result<DealDocument> {
        let deal = self
            .require_authorized(caller, id, Action::AddDealDocument)
            .await?;

        let now = Utc::now();
        let document = DealDocument::attach(deal.id, caller.user_id, new, now)?;
        let event = TimelineEvent::document_added(deal.id, &document.file_name, caller.user_id, now);
        let batch = WriteBatch::new()
            .push(Repository::<S, DealDocument>::insert_op(&document)?)
            .push(Repository::<S, TimelineEvent>::insert_op(&event)?);
        self.deals.store().commit(batch).await?;

        tracing::info!(deal_id = %deal.id, document_id = %document.id, "Document added");
        metrics::counter!("deal_documents_added_total").increment(1);
        Ok(document)
    }

    pub async fn list_documents(&self, caller: &Caller, id: DealId) -> Result<Vec<DealDocument>> {
        self.config
            .bounded("list_documents", self.list_documents_inner(caller, id))
            .await
    }

    async fn list_documents_inner(&self, caller: &Caller, id: DealId) -> Result<Vec<DealDocument>> {
        let deal = self
            .require_authorized(caller, id, Action::ViewDealDocuments)
            .await?;
        let query = Repository::<S, DealDocument>::query()
            .eq("deal_id", serde_json::to_value(deal.id).map_err(DomainError::from)?);
        Ok(self.documents.find(query).await?)
    }

    /// Completes an in-progress deal and closes its listing.
    ///
    /// The deal, the listing and the "Deal Completed" event are written
    /// together. A repeated call fails with `InvalidState`. If the listing is
    /// not under a letter of intent the records disagree and the call fails
    /// with `Inconsistent` without writing anything.
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn complete(&self, caller: &Caller, id: DealId) -> Result<Deal> {
        self.config
            .bounded("complete_deal", self.complete_inner(caller, id))
            .await
    }

    async fn complete_inner(&self, caller: &Caller, id: DealId) -> Result<Deal> {
        let deal = self
            .require_authorized(caller, id, Action::CompleteDeal)
            .await?;
        if !deal.status.can_complete() {
            return Err(WorkflowError::invalid_state(CANNOT_COMPLETE));
        }

        let now = Utc::now();
        let event = TimelineEvent::deal_completed(deal.id, now);
        let batch = WriteBatch::new()
            .push(Repository::<S, Deal>::patch_op(
                deal.id,
                Deal::status_fields(DealStatus::Completed, now),
                Precondition::field_in("status", [DealStatus::InProgress.as_str()]),
            ))
            .push(Repository::<S, BusinessListing>::patch_op(
                deal.business_id,
                BusinessListing::status_fields(ListingStatus::Closed, now),
                Precondition::field_in("status", [ListingStatus::UnderLoi.as_str()]),
            ))
            .push(Repository::<S, TimelineEvent>::insert_op(&event)?);

        let written = match self.deals.store().commit(batch).await {
            Ok(written) => written,
            Err(e) if Repository::<S, Deal>::is_conflict_on(&e, deal.id) => {
                return Err(WorkflowError::invalid_state(CANNOT_COMPLETE));
            }
            Err(e) if Repository::<S, BusinessListing>::is_conflict_on(&e, deal.business_id) => {
                return Err(listing_mismatch(&deal, "is not under a letter of intent"));
            }
            Err(DocumentStoreError::NotFound { ref collection, .. })
                if collection == BusinessListing::COLLECTION =>
            {
                return Err(listing_mismatch(&deal, "no longer exists"));
            }
            Err(e) => return Err(e.into()),
        };

        let completed = match written.first() {
            Some(doc) => Repository::<S, Deal>::decode(doc)?,
            None => return Err(DomainError::not_found(Deal::KIND, deal.id).into()),
        };

        tracing::info!(deal_id = %deal.id, listing_id = %deal.business_id, "Deal completed");
        metrics::counter!("deals_completed_total").increment(1);
        Ok(completed)
    }

    async fn require_authorized(&self, caller: &Caller, id: DealId, action: Action) -> Result<Deal> {
        let deal = self.deals.require(id).await?;
        authorize(caller, action, &deal.parties()).map_err(DomainError::from)?;
        Ok(deal)
    }

    /// Embeds listings and timelines, two queries regardless of the number of
    /// deals.
    async fn with_details(&self, deals: Vec<Deal>) -> Result<Vec<DealView>> {
        if deals.is_empty() {
            return Ok(Vec::new());
        }

        let listing_ids: BTreeSet<ListingId> = deals.iter().map(|d| d.business_id).collect();
        let listing_ids = listing_ids
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DomainError::from)?;
        let listings: HashMap<ListingId, BusinessListing> = self
            .listings
            .find(Repository::<S, BusinessListing>::query().one_of("id", listing_ids))
            .await?
            .into_iter()
            .map(|l| (l.id, l))
            .collect();

        let deal_ids = deals
            .iter()
            .map(|d| serde_json::to_value(d.id))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DomainError::from)?;
        let mut timelines: HashMap<DealId, Vec<TimelineEvent>> = HashMap::new();
        for event in self
            .events
            .find(Repository::<S, TimelineEvent>::query().one_of("deal_id", deal_ids))
            .await?
        {
            timelines.entry(event.deal_id).or_default().push(event);
        }

        Ok(deals
            .into_iter()
            .map(|deal| DealView {
                business: listings.get(&deal.business_id).cloned(),
                timeline_events: timelines.remove(&deal.id).unwrap_or_default(),
                deal,
            })
            .collect())
    }
}

fn listing_mismatch(deal: &Deal, problem: &str) -> WorkflowError {
    tracing::error!(
        deal_id = %deal.id,
        listing_id = %deal.business_id,
        "Listing of an in-progress deal {problem}"
    );
    metrics::counter!("workflow_inconsistencies_total", "kind" => "deal_listing_mismatch")
        .increment(1);
    WorkflowError::Inconsistent(format!(
        "The listing of deal {} {problem}",
        deal.id
    ))
}
