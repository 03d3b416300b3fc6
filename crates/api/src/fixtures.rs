//! Sample listings served while the database is unreachable, or loaded
//! into the in-memory store for local runs.

use chrono::Utc;
use common::UserId;
use document_store::{DocumentStore, InMemoryDocumentStore};
use domain::{BusinessListing, DomainError, ListingStatus, Money, NewListing, Repository};

struct Sample {
    title: &'static str,
    industry: &'static str,
    location: &'static str,
    revenue: i64,
    profit: i64,
    asking: i64,
    raised: i64,
    investors: u32,
}

const SAMPLES: &[Sample] = &[
    Sample {
        title: "Sunrise Coffee Roasters",
        industry: "Food & Beverage",
        location: "Portland, OR",
        revenue: 850_000,
        profit: 170_000,
        asking: 1_200_000,
        raised: 300_000,
        investors: 12,
    },
    Sample {
        title: "Precision Auto Repair",
        industry: "Automotive",
        location: "Columbus, OH",
        revenue: 1_400_000,
        profit: 310_000,
        asking: 950_000,
        raised: 150_000,
        investors: 5,
    },
    Sample {
        title: "Evergreen Landscaping",
        industry: "Home Services",
        location: "Raleigh, NC",
        revenue: 620_000,
        profit: 140_000,
        asking: 480_000,
        raised: 0,
        investors: 0,
    },
];

/// Builds the active sample listings.
pub fn sample_listings() -> Vec<BusinessListing> {
    let seller = UserId::new();
    let now = Utc::now();
    SAMPLES
        .iter()
        .map(|s| {
            let mut listing = BusinessListing::draft(
                seller,
                NewListing {
                    title: s.title.to_string(),
                    industry: s.industry.to_string(),
                    location: s.location.to_string(),
                    description: Some(format!("Established {} business in {}", s.industry, s.location)),
                    annual_revenue: Some(Money::from_dollars(s.revenue)),
                    annual_profit: Some(Money::from_dollars(s.profit)),
                    asking_price: Some(Money::from_dollars(s.asking)),
                    funding_target: Some(Money::from_dollars(s.asking / 2)),
                    ..Default::default()
                },
                now,
            );
            listing.status = ListingStatus::Active;
            listing.funding_raised = Money::from_dollars(s.raised);
            listing.investor_count = s.investors;
            listing
        })
        .collect()
}

/// Writes the sample listings into `store`.
pub async fn seed<S: DocumentStore>(store: S) -> Result<(), DomainError> {
    let listings = Repository::<S, BusinessListing>::new(store);
    for listing in sample_listings() {
        listings.insert(&listing).await?;
    }
    Ok(())
}

/// An in-memory store holding only the sample listings.
pub async fn fixture_store() -> Result<InMemoryDocumentStore, DomainError> {
    let store = InMemoryDocumentStore::new();
    seed(store.clone()).await?;
    Ok(store)
}
