//! Routes for products and their purchase history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use flashsale_core::entity::{Product, SaleLog};
use flashsale_sales::application::{command_handlers, query_handlers};
use flashsale_sales::domain::commands;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /products.
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    /// Display name.
    pub name: String,
    /// List price.
    pub price: Decimal,
    /// Initial stock.
    pub stock: i32,
}

/// POST /products
#[instrument(skip(state, request), fields(name = %request.name))]
async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let command = commands::CreateProduct {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        price: request.price,
        stock: request.stock,
    };

    info!(correlation_id = %command.correlation_id, "handling create_product command");

    let product = command_handlers::handle_create_product(
        &command,
        state.store.as_ref(),
        state.cache.as_ref(),
        state.cache_write_policy,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id}
async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    let product =
        query_handlers::get_product(product_id, state.store.as_ref(), state.cache.as_ref())
            .await?;
    Ok(Json(product))
}

/// GET /products/{id}/sale-logs
async fn list_sale_logs(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<Vec<SaleLog>>, ApiError> {
    let logs = query_handlers::list_sale_logs(product_id, state.store.as_ref()).await?;
    Ok(Json(logs))
}

/// Returns the router for products.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/{id}", get(get_product))
        .route("/{id}/sale-logs", get(list_sale_logs))
}
