//! Business listing records and requests.

use chrono::{DateTime, Utc};
use common::{ListingId, PipelineDealId, UserId};
use document_store::{DocumentQuery, Patch};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ListingStatus;
use crate::error::DomainError;
use crate::money::Money;
use crate::record::{Record, fields};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_FEATURED: usize = 6;
pub const MAX_FEATURED: usize = 12;

/// A business offered for sale, and optionally for investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessListing {
    pub id: ListingId,
    pub seller_id: UserId,
    pub title: String,
    pub industry: String,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub annual_revenue: Option<Money>,
    #[serde(default)]
    pub annual_profit: Option<Money>,
    #[serde(default)]
    pub asking_price: Option<Money>,
    #[serde(default)]
    pub employees_count: Option<u32>,
    #[serde(default)]
    pub years_in_business: Option<u32>,
    #[serde(default)]
    pub reason_for_selling: Option<String>,
    #[serde(default)]
    pub funding_target: Option<Money>,
    #[serde(default)]
    pub funding_raised: Money,
    #[serde(default)]
    pub investor_count: u32,
    #[serde(default)]
    pub funding_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    pub status: ListingStatus,
    /// Mirrors `status == UnderLoi`; kept for clients that filter on it.
    #[serde(default)]
    pub under_loi: bool,
    /// Pipeline deal this listing was published from, if any.
    #[serde(default)]
    pub seedstack_deal_id: Option<PipelineDealId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for BusinessListing {
    type Id = ListingId;
    const COLLECTION: &'static str = "listings";
    const KIND: &'static str = "Business listing";

    fn id(&self) -> ListingId {
        self.id
    }
}

impl BusinessListing {
    /// Creates a draft listing owned by `seller_id`.
    pub fn draft(seller_id: UserId, new: NewListing, now: DateTime<Utc>) -> Self {
        Self {
            id: ListingId::new(),
            seller_id,
            title: new.title.trim().to_string(),
            industry: new.industry.trim().to_string(),
            location: new.location.trim().to_string(),
            description: new.description,
            annual_revenue: new.annual_revenue,
            annual_profit: new.annual_profit,
            asking_price: new.asking_price,
            employees_count: new.employees_count,
            years_in_business: new.years_in_business,
            reason_for_selling: new.reason_for_selling,
            funding_target: new.funding_target,
            funding_raised: Money::zero(),
            investor_count: 0,
            funding_end_date: new.funding_end_date,
            cover_image_url: new.cover_image_url,
            status: ListingStatus::Draft,
            under_loi: false,
            seedstack_deal_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fields written on every status change. `under_loi` always moves
    /// together with `status`.
    pub fn status_fields(status: ListingStatus, now: DateTime<Utc>) -> Patch {
        fields(json!({
            "status": status,
            "under_loi": status == ListingStatus::UnderLoi,
            "updated_at": now,
        }))
    }
}

fn require_text(name: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{name} is required")));
    }
    Ok(())
}

fn require_non_negative(name: &str, value: Option<Money>) -> Result<(), DomainError> {
    if value.is_some_and(|m| m.is_negative()) {
        return Err(DomainError::validation(format!(
            "{name} cannot be negative"
        )));
    }
    Ok(())
}

/// Request to create a listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewListing {
    pub title: String,
    pub industry: String,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub annual_revenue: Option<Money>,
    #[serde(default)]
    pub annual_profit: Option<Money>,
    #[serde(default)]
    pub asking_price: Option<Money>,
    #[serde(default)]
    pub employees_count: Option<u32>,
    #[serde(default)]
    pub years_in_business: Option<u32>,
    #[serde(default)]
    pub reason_for_selling: Option<String>,
    #[serde(default)]
    pub funding_target: Option<Money>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub funding_end_date: Option<DateTime<Utc>>,
}

impl NewListing {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("title", &self.title)?;
        require_text("industry", &self.industry)?;
        require_text("location", &self.location)?;
        require_non_negative("annual_revenue", self.annual_revenue)?;
        require_non_negative("asking_price", self.asking_price)?;
        require_non_negative("funding_target", self.funding_target)?;
        Ok(())
    }
}

/// Partial update of a listing's descriptive and financial fields.
///
/// Status is deliberately absent; it changes only through publishing,
/// offer acceptance and deal completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_revenue: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_profit: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asking_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_in_business: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_selling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_target: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_end_date: Option<DateTime<Utc>>,
}

impl ListingUpdate {
    /// Validates the update and turns it into a patch stamped with `now`.
    pub fn into_patch(self, now: DateTime<Utc>) -> Result<Patch, DomainError> {
        for (name, value) in [
            ("title", &self.title),
            ("industry", &self.industry),
            ("location", &self.location),
        ] {
            if let Some(v) = value {
                require_text(name, v)?;
            }
        }
        require_non_negative("annual_revenue", self.annual_revenue)?;
        require_non_negative("asking_price", self.asking_price)?;
        require_non_negative("funding_target", self.funding_target)?;

        let mut patch = fields(serde_json::to_value(&self)?);
        if patch.is_empty() {
            return Err(DomainError::validation("No fields to update"));
        }
        patch.insert("updated_at".to_string(), serde_json::to_value(now)?);
        Ok(patch)
    }
}

/// Marketplace search parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilter {
    /// Defaults to `active`.
    #[serde(default)]
    pub status: Option<ListingStatus>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_revenue: Option<Money>,
    #[serde(default)]
    pub max_revenue: Option<Money>,
    #[serde(default)]
    pub min_profit: Option<Money>,
    #[serde(default)]
    pub max_profit: Option<Money>,
    /// Free text matched against title, description and industry.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListingFilter {
    /// Builds the newest-first document query for this filter.
    pub fn to_query(&self) -> Result<DocumentQuery, DomainError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let status = self.status.unwrap_or(ListingStatus::Active);
        let mut query = DocumentQuery::collection(BusinessListing::COLLECTION)
            .eq("status", status.as_str())
            .newest_first()
            .offset(self.skip.unwrap_or(0))
            .limit(limit);

        if let Some(industry) = non_blank(&self.industry) {
            query = query.contains("industry", industry);
        }
        if let Some(location) = non_blank(&self.location) {
            query = query.contains("location", location);
        }
        if let Some(min) = self.min_revenue {
            query = query.gte("annual_revenue", min.cents() as f64);
        }
        if let Some(max) = self.max_revenue {
            query = query.lte("annual_revenue", max.cents() as f64);
        }
        if let Some(min) = self.min_profit {
            query = query.gte("annual_profit", min.cents() as f64);
        }
        if let Some(max) = self.max_profit {
            query = query.lte("annual_profit", max.cents() as f64);
        }
        if let Some(search) = non_blank(&self.search) {
            use document_store::Condition::Contains;
            query = query.any(
                ["title", "description", "industry"]
                    .into_iter()
                    .map(|field| Contains {
                        field: field.to_string(),
                        needle: search.to_string(),
                    })
                    .collect(),
            );
        }
        Ok(query)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_listing() -> NewListing {
        NewListing {
            title: "Corner Cafe".into(),
            industry: "Food & Beverage".into(),
            location: "Austin, TX".into(),
            asking_price: Some(Money::from_dollars(250_000)),
            ..Default::default()
        }
    }

    #[test]
    fn draft_starts_unfunded_and_not_under_loi() {
        let listing = BusinessListing::draft(UserId::new(), new_listing(), Utc::now());
        assert_eq!(listing.status, ListingStatus::Draft);
        assert!(!listing.under_loi);
        assert_eq!(listing.funding_raised, Money::zero());
        assert_eq!(listing.investor_count, 0);
    }

    #[test]
    fn new_listing_requires_title() {
        let mut new = new_listing();
        new.title = "  ".into();
        assert!(matches!(new.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn new_listing_rejects_negative_price() {
        let mut new = new_listing();
        new.asking_price = Some(Money::from_cents(-1));
        assert!(new.validate().is_err());
    }

    #[test]
    fn status_fields_keep_under_loi_in_sync() {
        let now = Utc::now();
        let patch = BusinessListing::status_fields(ListingStatus::UnderLoi, now);
        assert_eq!(patch["status"], "under_loi");
        assert_eq!(patch["under_loi"], true);

        let patch = BusinessListing::status_fields(ListingStatus::Closed, now);
        assert_eq!(patch["under_loi"], false);
    }

    #[test]
    fn update_patch_only_contains_given_fields() {
        let update = ListingUpdate {
            title: Some("Renamed".into()),
            ..Default::default()
        };
        let patch = update.into_patch(Utc::now()).unwrap();
        assert_eq!(patch.len(), 2);
        assert_eq!(patch["title"], "Renamed");
        assert!(patch.contains_key("updated_at"));
    }

    #[test]
    fn empty_update_is_rejected() {
        assert!(ListingUpdate::default().into_patch(Utc::now()).is_err());
    }

    #[test]
    fn filter_defaults_to_active_page_of_twenty() {
        let query = ListingFilter::default().to_query().unwrap();
        assert_eq!(query.limit, Some(DEFAULT_PAGE_SIZE));
        assert_eq!(query.offset, Some(0));
        assert!(query.matches(&json!({"status": "active"})));
        assert!(!query.matches(&json!({"status": "draft"})));
    }

    #[test]
    fn filter_limit_is_bounded() {
        let filter = ListingFilter {
            limit: Some(101),
            ..Default::default()
        };
        assert!(filter.to_query().is_err());

        let filter = ListingFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert!(filter.to_query().is_err());
    }

    #[test]
    fn filter_search_matches_any_text_field() {
        let filter = ListingFilter {
            search: Some("espresso".into()),
            ..Default::default()
        };
        let query = filter.to_query().unwrap();
        assert!(query.matches(&json!({"status": "active", "title": "Espresso Bar"})));
        assert!(query.matches(&json!({
            "status": "active",
            "title": "Cafe",
            "description": "Busy espresso counter"
        })));
        assert!(!query.matches(&json!({"status": "active", "title": "Gym"})));
    }
}
