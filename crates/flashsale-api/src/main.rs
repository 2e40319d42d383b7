//! Flash sale API server entry point.

use std::sync::Arc;

use flashsale_api::config::{Config, StoreBackend};
use flashsale_api::error::AppError;
use flashsale_api::observability::Observability;
use flashsale_api::state::AppState;
use flashsale_cache::InMemoryCache;
use flashsale_core::clock::SystemClock;
use flashsale_core::repository::SaleStore;
use flashsale_sales::application::command_handlers::seed_demo_products;
use flashsale_sales::application::purchase::SimulatedProcessor;
use flashsale_store::{InMemorySaleStore, PgSaleStore};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let observability = Observability::init(&config)?;

    info!("Starting flash sale API server");

    let store = build_store(&config).await?;
    if config.seed_demo_products {
        let products = seed_demo_products(store.as_ref()).await?;
        info!(count = products.len(), "seeded demo products");
    }

    // Build application state.
    let app_state = AppState::new(
        store,
        Arc::new(InMemoryCache::new()),
        Arc::new(SystemClock),
        Arc::new(SimulatedProcessor),
        config.cache_write_policy,
        config.purchase,
    );

    // Build router.
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = flashsale_api::build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr = config.socket_addr()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    observability.shutdown();
    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn SaleStore>, AppError> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("using in-process store");
            Ok(Arc::new(InMemorySaleStore::with_lock_timeout(
                config.lock_timeout,
            )))
        }
        StoreBackend::Postgres => {
            let database_url = config.database_url.as_deref().ok_or_else(|| {
                AppError::Config("DATABASE_URL environment variable must be set".into())
            })?;

            // Create database connection pool.
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;
            sqlx::migrate!("../../migrations").run(&pool).await?;

            Ok(Arc::new(PgSaleStore::new(pool, config.lock_timeout)))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
