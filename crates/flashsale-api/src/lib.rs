//! Flash sale HTTP API.
//!
//! Exposed as a library so integration tests can build the same router the
//! binary serves.

use axum::Router;

pub mod config;
pub mod error;
pub mod observability;
pub mod routes;
pub mod state;

/// Builds the application router over `state`.
pub fn build_router(state: state::AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/flash-sales", routes::flash_sales::router())
        .nest("/api/v1/products", routes::products::router())
        .with_state(state)
}
