//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::{Config, LogFormat};
use api::state::AppState;
use document_store::{
    DocumentStore, FallbackDocumentStore, InMemoryDocumentStore, PostgresDocumentStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn reconcile_once<S: DocumentStore>(state: &AppState<S>) {
    match state.reconciler.run().await {
        Ok(report) if report.is_clean() => {
            tracing::debug!("reconciliation found nothing to repair");
        }
        Ok(report) => tracing::warn!(
            deals_repaired = report.deals_repaired,
            listings_repaired = report.listings_repaired,
            conflicts = report.conflicts.len(),
            "reconciliation repaired records"
        ),
        Err(e) => tracing::error!(error = %e, "reconciliation failed"),
    }
}

/// Runs the server over `store` until a shutdown signal arrives.
async fn serve<S: DocumentStore + Clone + 'static>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_state(store, config);

    // Repair anything a crash left half-written before taking traffic.
    reconcile_once(&state).await;

    if let Some(every) = config.reconcile_interval {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                reconcile_once(&state).await;
            }
        });
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // 2. Initialize tracing
    init_tracing(&config);
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set, using the development secret");
    }

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the document store and run
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await
                .expect("failed to connect to database");

            let store = PostgresDocumentStore::new(pool.clone());
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("connected to PostgreSQL document store");

            if config.fallback_fixtures {
                let fixtures = api::fixtures::fixture_store()
                    .await
                    .expect("failed to build fixture store");
                tracing::info!("serving sample listings while the database is unreachable");
                serve(
                    FallbackDocumentStore::new(store, fixtures),
                    &config,
                    metrics_handle,
                )
                .await;
            } else {
                serve(store, &config, metrics_handle).await;
            }

            pool.close().await;
        }
        None => {
            let store = InMemoryDocumentStore::new();
            if config.fallback_fixtures {
                api::fixtures::seed(store.clone())
                    .await
                    .expect("failed to seed sample listings");
            }
            tracing::info!("using in-memory document store");
            serve(store, &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
