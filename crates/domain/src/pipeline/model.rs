use chrono::{DateTime, Utc};
use common::{ListingId, PipelineDealId, UserId};
use document_store::Patch;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::listing::ListingStatus;
use crate::money::Money;
use crate::record::{Record, fields};

/// How far along an acquisition target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Interested,
    LoiSent,
    Diligence,
    Closing,
    Closed,
}

impl PipelineStage {
    /// A deal may be listed publicly once a letter of intent has been sent.
    pub fn can_publish(&self) -> bool {
        !matches!(self, PipelineStage::Interested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// An acquisition target tracked privately by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDeal {
    pub id: PipelineDealId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub revenue: Option<Money>,
    #[serde(default)]
    pub asking_price: Option<Money>,
    #[serde(default)]
    pub ebitda: Option<Money>,
    pub stage: PipelineStage,
    pub priority: Priority,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub broker_contact: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub marketplace_listing_id: Option<ListingId>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for PipelineDeal {
    type Id = PipelineDealId;
    const COLLECTION: &'static str = "pipeline_deals";
    const KIND: &'static str = "Deal";

    fn id(&self) -> PipelineDealId {
        self.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPipelineDeal {
    pub title: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub revenue: Option<Money>,
    #[serde(default)]
    pub asking_price: Option<Money>,
    #[serde(default)]
    pub ebitda: Option<Money>,
    #[serde(default)]
    pub stage: Option<PipelineStage>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub broker_contact: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl PipelineDeal {
    pub fn track(
        user_id: UserId,
        new: NewPipelineDeal,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if new.title.trim().is_empty() {
            return Err(DomainError::validation("title is required"));
        }
        Ok(Self {
            id: PipelineDealId::new(),
            user_id,
            title: new.title.trim().to_string(),
            industry: new.industry,
            location: new.location,
            revenue: new.revenue,
            asking_price: new.asking_price,
            ebitda: new.ebitda,
            stage: new.stage.unwrap_or_default(),
            priority: new.priority.unwrap_or_default(),
            notes: new.notes,
            broker_contact: new.broker_contact,
            source: new.source,
            marketplace_listing_id: None,
            last_activity: now,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDealUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asking_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebitda: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl PipelineDealUpdate {
    /// Turns the update into a patch that also refreshes `last_activity`.
    pub fn into_patch(self, now: DateTime<Utc>) -> Result<Patch, DomainError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(DomainError::validation("title cannot be blank"));
        }
        let mut patch = fields(serde_json::to_value(&self)?);
        let now = serde_json::to_value(now)?;
        patch.insert("last_activity".to_string(), now.clone());
        patch.insert("updated_at".to_string(), now);
        Ok(patch)
    }
}

/// Funding progress of the listing a pipeline deal was published as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketplaceStatus {
    pub listing_id: ListingId,
    pub status: ListingStatus,
    pub under_loi: bool,
    pub funding_target: Option<Money>,
    pub funding_raised: Money,
    pub funding_percentage: f64,
    pub investor_count: u32,
}
