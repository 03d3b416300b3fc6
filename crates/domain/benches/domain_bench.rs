use common::UserId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Action, Caller, ListingFilter, ListingService, Money, NewListing, Parties, Role, authorize,
};
use document_store::InMemoryDocumentStore;

fn new_listing(n: i64) -> NewListing {
    NewListing {
        title: format!("Business {n}"),
        industry: if n % 2 == 0 { "Retail" } else { "Services" }.to_string(),
        location: "Columbus, OH".into(),
        annual_revenue: Some(Money::from_dollars(n * 10_000)),
        ..Default::default()
    }
}

fn bench_authorize(c: &mut Criterion) {
    let seller = Caller::new(UserId::new(), Role::Seller);
    let parties = Parties::none().seller(seller.user_id).buyer(UserId::new());

    c.bench_function("domain/authorize_complete_deal", |b| {
        b.iter(|| authorize(&seller, Action::CompleteDeal, &parties).unwrap());
    });
}

fn bench_money_display(c: &mut Criterion) {
    let amount = Money::from_cents(123_456_789);

    c.bench_function("domain/money_display", |b| {
        b.iter(|| amount.to_string());
    });
}

fn bench_create_and_publish(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let seller = Caller::new(UserId::new(), Role::Seller);

    c.bench_function("domain/create_and_publish_listing", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = ListingService::new(InMemoryDocumentStore::new());
                let listing = service.create(&seller, new_listing(1)).await.unwrap();
                service.publish(&seller, listing.id).await.unwrap();
            });
        });
    });
}

fn bench_search_500(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let seller = Caller::new(UserId::new(), Role::Seller);
    let service = ListingService::new(InMemoryDocumentStore::new());

    rt.block_on(async {
        for n in 0..500 {
            let listing = service.create(&seller, new_listing(n)).await.unwrap();
            service.publish(&seller, listing.id).await.unwrap();
        }
    });

    let filter = ListingFilter {
        industry: Some("retail".into()),
        min_revenue: Some(Money::from_dollars(1_000_000)),
        ..Default::default()
    };

    c.bench_function("domain/search_500_listings", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.search(&filter).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_authorize,
    bench_money_display,
    bench_create_and_publish,
    bench_search_500
);
criterion_main!(benches);
