//! HTTP API server for the SeedSMB marketplace.
//!
//! Provides REST endpoints for listings, investments, offers, deals, user
//! profiles and the acquisition pipeline, with bearer token authentication,
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use document_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::TokenVerifier;
use config::Config;
use routes::{admin, deals, investments, listings, offers, pipeline, profiles};
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/listings", post(listings::create::<S>).get(listings::search::<S>))
        .route("/listings/featured", get(listings::featured::<S>))
        .route("/listings/seller/{seller_id}", get(listings::by_seller::<S>))
        .route(
            "/listings/{id}",
            get(listings::get::<S>)
                .put(listings::update::<S>)
                .delete(listings::delete::<S>),
        )
        .route("/listings/{id}/publish", put(listings::publish::<S>))
        .route(
            "/investments",
            post(investments::create::<S>).get(investments::list_mine::<S>),
        )
        .route(
            "/investments/business/{business_id}",
            get(investments::for_business::<S>),
        )
        .route("/investments/{id}", get(investments::get::<S>))
        .route("/offers", post(offers::create::<S>).get(offers::list_mine::<S>))
        .route("/offers/seller", get(offers::list_received::<S>))
        .route("/offers/{id}", get(offers::get::<S>))
        .route("/offers/{id}/accept", post(offers::accept::<S>))
        .route("/offers/{id}/reject", post(offers::reject::<S>))
        .route("/deals", get(deals::list::<S>))
        .route("/deals/{id}", get(deals::get::<S>))
        .route("/deals/{id}/timeline", post(deals::append_timeline::<S>))
        .route("/deals/{id}/complete", post(deals::complete::<S>))
        .route(
            "/deals/{id}/documents",
            post(deals::add_document::<S>).get(deals::list_documents::<S>),
        )
        .route(
            "/profiles/me",
            get(profiles::me::<S>).put(profiles::update_me::<S>),
        )
        .route(
            "/profiles/me/complete-onboarding",
            put(profiles::complete_onboarding::<S>),
        )
        .route("/profiles/type/{user_type}", get(profiles::by_type::<S>))
        .route("/profiles/{user_id}", get(profiles::get::<S>))
        .route(
            "/seedstack/deals",
            get(pipeline::list::<S>).post(pipeline::create::<S>),
        )
        .route(
            "/seedstack/deals/{id}",
            put(pipeline::update::<S>).delete(pipeline::delete::<S>),
        )
        .route(
            "/seedstack/deals/{id}/publish-to-marketplace",
            post(pipeline::publish::<S>),
        )
        .route(
            "/integration/marketplace-status/{deal_id}",
            get(pipeline::marketplace_status::<S>),
        )
        .route("/admin/reconcile", post(admin::reconcile::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store` as configured.
pub fn create_state<S: DocumentStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(
        store,
        config.workflow(),
        TokenVerifier::new(&config.jwt_secret),
    ))
}
