//! Pipeline service.

use chrono::Utc;
use common::PipelineDealId;
use document_store::{DocumentStore, Precondition, WriteBatch};
use serde_json::{Value, json};

use super::{MarketplaceStatus, NewPipelineDeal, PipelineDeal, PipelineDealUpdate};
use crate::error::DomainError;
use crate::identity::Caller;
use crate::listing::{BusinessListing, ListingStatus, NewListing};
use crate::policy::{Action, Parties, authorize};
use crate::record::fields;
use crate::repository::Repository;

/// Share of the asking price a published deal seeks from investors.
const FUNDING_TARGET_PERCENT: i64 = 80;

pub struct PipelineService<S: DocumentStore> {
    deals: Repository<S, PipelineDeal>,
    listings: Repository<S, BusinessListing>,
}

impl<S: DocumentStore + Clone> PipelineService<S> {
    pub fn new(store: S) -> Self {
        Self {
            deals: Repository::new(store.clone()),
            listings: Repository::new(store),
        }
    }
}

impl<S: DocumentStore> PipelineService<S> {
    pub async fn list(&self, caller: &Caller) -> Result<Vec<PipelineDeal>, DomainError> {
        let query = Repository::<S, PipelineDeal>::query()
            .eq("user_id", serde_json::to_value(caller.user_id)?)
            .newest_first();
        self.deals.find(query).await
    }

    pub async fn create(
        &self,
        caller: &Caller,
        new: NewPipelineDeal,
    ) -> Result<PipelineDeal, DomainError> {
        let deal = PipelineDeal::track(caller.user_id, new, Utc::now())?;
        self.deals.insert(&deal).await
    }

    pub async fn get(&self, caller: &Caller, id: PipelineDealId) -> Result<PipelineDeal, DomainError> {
        let deal = self.deals.require(id).await?;
        authorize(caller, Action::ManagePipelineDeal, &deal.parties())?;
        Ok(deal)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: PipelineDealId,
        update: PipelineDealUpdate,
    ) -> Result<PipelineDeal, DomainError> {
        self.get(caller, id).await?;
        let patch = update.into_patch(Utc::now())?;
        self.deals.patch(id, patch, Precondition::none()).await
    }

    pub async fn delete(&self, caller: &Caller, id: PipelineDealId) -> Result<(), DomainError> {
        self.get(caller, id).await?;
        self.deals.delete(id, Precondition::none()).await
    }

    /// Lists a pipeline deal on the marketplace as an active listing that
    /// seeks investment for a share of the asking price.
    ///
    /// The listing insert and the back-reference on the pipeline deal are
    /// written together; a deal is published at most once.
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn publish_to_marketplace(
        &self,
        caller: &Caller,
        id: PipelineDealId,
    ) -> Result<BusinessListing, DomainError> {
        const ALREADY_PUBLISHED: &str = "Deal is already published to the marketplace";

        let deal = self.get(caller, id).await?;
        if !deal.stage.can_publish() {
            return Err(DomainError::invalid_state(
                "Deal must be at LOI stage or beyond to publish to marketplace",
            ));
        }
        if deal.marketplace_listing_id.is_some() {
            return Err(DomainError::invalid_state(ALREADY_PUBLISHED));
        }
        let asking_price = deal.asking_price.ok_or_else(|| {
            DomainError::validation("An asking price is required to publish to the marketplace")
        })?;

        let now = Utc::now();
        let new = NewListing {
            title: deal.title.clone(),
            industry: deal
                .industry
                .clone()
                .unwrap_or_else(|| "General".to_string()),
            location: deal
                .location
                .clone()
                .unwrap_or_else(|| "Undisclosed".to_string()),
            description: Some(format!(
                "Investment opportunity in {}. Revenue: {}. Asking: {}",
                deal.title,
                deal.revenue
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "undisclosed".to_string()),
                asking_price,
            )),
            annual_revenue: deal.revenue,
            annual_profit: deal.ebitda,
            asking_price: Some(asking_price),
            funding_target: Some(asking_price.percent(FUNDING_TARGET_PERCENT)),
            ..Default::default()
        };
        new.validate()?;

        let mut listing = BusinessListing::draft(caller.user_id, new, now);
        listing.status = ListingStatus::Active;
        listing.seedstack_deal_id = Some(deal.id);

        let back_link = fields(json!({
            "marketplace_listing_id": listing.id,
            "last_activity": now,
            "updated_at": now,
        }));
        let batch = WriteBatch::new()
            .push(Repository::<S, BusinessListing>::insert_op(&listing)?)
            .push(Repository::<S, PipelineDeal>::patch_op(
                deal.id,
                back_link,
                Precondition::field_in("marketplace_listing_id", [Value::Null]),
            ));
        self.deals
            .store()
            .commit(batch)
            .await
            .map_err(|e| DomainError::from(e).on_conflict(ALREADY_PUBLISHED))?;

        tracing::info!(
            pipeline_deal_id = %deal.id,
            listing_id = %listing.id,
            "Pipeline deal published to marketplace"
        );
        metrics::counter!("pipeline_deals_published_total").increment(1);
        Ok(listing)
    }

    pub async fn marketplace_status(
        &self,
        caller: &Caller,
        id: PipelineDealId,
    ) -> Result<MarketplaceStatus, DomainError> {
        let deal = self.get(caller, id).await?;
        let listing_id = deal.marketplace_listing_id.ok_or_else(|| {
            DomainError::invalid_state("Deal has not been published to the marketplace")
        })?;
        let listing = self.listings.require(listing_id).await?;

        let funding_percentage = listing
            .funding_target
            .map(|target| target.ratio_percent(listing.funding_raised))
            .unwrap_or(0.0);

        Ok(MarketplaceStatus {
            listing_id,
            status: listing.status,
            under_loi: listing.under_loi,
            funding_target: listing.funding_target,
            funding_raised: listing.funding_raised,
            funding_percentage,
            investor_count: listing.investor_count,
        })
    }
}

impl PipelineDeal {
    pub fn parties(&self) -> Parties {
        Parties::none().owner(self.user_id)
    }
}
