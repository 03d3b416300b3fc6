//! Integration tests for the listing registry, investment ledger and
//! pipeline services sharing one document store.

use common::UserId;
use domain::{
    Caller, DomainError, InvestmentLedger, ListingFilter, ListingService, ListingStatus, Money,
    NewInvestment, NewListing, NewPipelineDeal, PipelineService, PipelineStage, Role,
};
use document_store::InMemoryDocumentStore;

fn caller(role: Role) -> Caller {
    Caller::new(UserId::new(), role)
}

fn listing_request(title: &str, revenue: i64, profit: i64) -> NewListing {
    NewListing {
        title: title.into(),
        industry: "Home Services".into(),
        location: "Phoenix, AZ".into(),
        description: Some(format!("{title} with loyal customers")),
        annual_revenue: Some(Money::from_dollars(revenue)),
        annual_profit: Some(Money::from_dollars(profit)),
        asking_price: Some(Money::from_dollars(revenue * 2)),
        funding_target: Some(Money::from_dollars(revenue)),
        ..Default::default()
    }
}

mod listing_search {
    use super::*;

    async fn seeded() -> ListingService<InMemoryDocumentStore> {
        let service = ListingService::new(InMemoryDocumentStore::new());
        let seller = caller(Role::Seller);
        for (title, revenue, profit) in [
            ("Pool Cleaning", 300_000, 90_000),
            ("Plumbing Co", 900_000, 200_000),
            ("Roofing Crew", 1_500_000, 150_000),
        ] {
            let listing = service
                .create(&seller, listing_request(title, revenue, profit))
                .await
                .unwrap();
            service.publish(&seller, listing.id).await.unwrap();
        }
        service
    }

    #[tokio::test]
    async fn revenue_range() {
        let service = seeded().await;
        let filter = ListingFilter {
            min_revenue: Some(Money::from_dollars(500_000)),
            max_revenue: Some(Money::from_dollars(1_000_000)),
            ..Default::default()
        };
        let found = service.search(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Plumbing Co");
    }

    #[tokio::test]
    async fn profit_floor_and_text_search() {
        let service = seeded().await;
        let filter = ListingFilter {
            min_profit: Some(Money::from_dollars(100_000)),
            search: Some("co".into()),
            ..Default::default()
        };
        let titles: Vec<String> = service
            .search(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, vec!["Plumbing Co".to_string()]);
    }

    #[tokio::test]
    async fn paging() {
        let service = seeded().await;
        let filter = ListingFilter {
            skip: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        let page = service.search(&filter).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Plumbing Co");
    }

    #[tokio::test]
    async fn drafts_are_hidden_by_default() {
        let service = seeded().await;
        service
            .create(&caller(Role::Seller), listing_request("Hidden", 1, 1))
            .await
            .unwrap();

        assert_eq!(service.search(&ListingFilter::default()).await.unwrap().len(), 3);
        let drafts = ListingFilter {
            status: Some(ListingStatus::Draft),
            ..Default::default()
        };
        assert_eq!(service.search(&drafts).await.unwrap().len(), 1);
    }
}

mod funding {
    use super::*;

    #[tokio::test]
    async fn featured_orders_by_funding_raised() {
        let store = InMemoryDocumentStore::new();
        let listings = ListingService::new(store.clone());
        let ledger = InvestmentLedger::new(store);
        let seller = caller(Role::Seller);

        let mut ids = Vec::new();
        for title in ["Small", "Large", "Medium"] {
            let listing = listings
                .create(&seller, listing_request(title, 100_000, 10_000))
                .await
                .unwrap();
            listings.publish(&seller, listing.id).await.unwrap();
            ids.push(listing.id);
        }
        for (id, dollars) in ids.iter().zip([1_000, 9_000, 5_000]) {
            ledger
                .pledge(
                    &caller(Role::Investor),
                    NewInvestment {
                        business_id: *id,
                        amount: Money::from_dollars(dollars),
                    },
                )
                .await
                .unwrap();
        }

        let featured = listings.featured(Some(2)).await.unwrap();
        let titles: Vec<&str> = featured.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Large", "Medium"]);
    }

    #[tokio::test]
    async fn draft_listing_rejects_pledges() {
        let store = InMemoryDocumentStore::new();
        let listings = ListingService::new(store.clone());
        let ledger = InvestmentLedger::new(store);

        let listing = listings
            .create(&caller(Role::Seller), listing_request("Draft", 1_000, 100))
            .await
            .unwrap();
        let result = ledger
            .pledge(
                &caller(Role::Investor),
                NewInvestment {
                    business_id: listing.id,
                    amount: Money::from_dollars(10),
                },
            )
            .await;
        match result {
            Err(DomainError::InvalidState(msg)) => {
                assert_eq!(msg, "Cannot invest in a non-active business")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

mod pipeline_bridge {
    use super::*;

    #[tokio::test]
    async fn published_pipeline_deal_is_searchable_and_fundable() {
        let store = InMemoryDocumentStore::new();
        let pipeline = PipelineService::new(store.clone());
        let listings = ListingService::new(store.clone());
        let ledger = InvestmentLedger::new(store);
        let acquirer = caller(Role::Buyer);

        let deal = pipeline
            .create(
                &acquirer,
                NewPipelineDeal {
                    title: "Landscaping Route".into(),
                    industry: Some("Home Services".into()),
                    asking_price: Some(Money::from_dollars(250_000)),
                    stage: Some(PipelineStage::Closing),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let listing = pipeline
            .publish_to_marketplace(&acquirer, deal.id)
            .await
            .unwrap();

        let found = listings.search(&ListingFilter::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, listing.id);

        ledger
            .pledge(
                &caller(Role::Investor),
                NewInvestment {
                    business_id: listing.id,
                    amount: Money::from_dollars(50_000),
                },
            )
            .await
            .unwrap();

        let status = pipeline.marketplace_status(&acquirer, deal.id).await.unwrap();
        assert_eq!(status.funding_raised, Money::from_dollars(50_000));
        assert_eq!(status.funding_percentage, 25.0);
        assert_eq!(status.investor_count, 1);
    }
}
