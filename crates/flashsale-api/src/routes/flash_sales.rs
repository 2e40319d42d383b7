//! Routes for flash sales: administration and the buy endpoint.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use chrono::{DateTime, Utc};
use flashsale_core::entity::{Sale, SaleChanges};
use flashsale_core::error::DomainError;
use flashsale_sales::application::{command_handlers, purchase, query_handlers};
use flashsale_sales::domain::commands;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /flash-sales.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    /// The product to put on sale.
    pub product_id: i64,
    /// Units allocated to the sale.
    pub sale_stock: i32,
    /// Discount percentage.
    pub discount: Decimal,
    /// Window start (RFC 3339).
    pub start_time: DateTime<Utc>,
    /// Window end (RFC 3339).
    pub end_time: DateTime<Utc>,
}

/// Request body for PUT /flash-sales. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    /// The sale to change.
    pub id: i64,
    /// New discount percentage.
    pub discount: Option<Decimal>,
    /// New sale stock.
    pub sale_stock: Option<i32>,
    /// New window start.
    pub start_time: Option<DateTime<Utc>>,
    /// New window end.
    pub end_time: Option<DateTime<Utc>>,
    /// New activation flag.
    pub active: Option<bool>,
}

/// Query string for POST /flash-sales/{id}/buy.
#[derive(Debug, Deserialize)]
pub struct BuyParams {
    /// Simulated processing time in seconds.
    pub wait: Option<u64>,
}

/// Purchase confirmation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyResponse {
    /// The product bought.
    pub product_id: i64,
    /// Sale stock left after this purchase.
    pub remaining_sale_stock: i32,
    /// Product stock left after this purchase.
    pub remaining_product_stock: i32,
    /// Price paid.
    pub price: Decimal,
    /// When the purchase was recorded.
    pub time: DateTime<Utc>,
}

/// POST /flash-sales
#[instrument(skip(state, request), fields(product_id = request.product_id))]
async fn create_sale(
    State(state): State<AppState>,
    Json(request): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<Sale>), ApiError> {
    let command = commands::CreateSale {
        correlation_id: Uuid::new_v4(),
        product_id: request.product_id,
        sale_stock: request.sale_stock,
        discount: request.discount,
        start_time: request.start_time,
        end_time: request.end_time,
    };

    info!(correlation_id = %command.correlation_id, "handling create_sale command");

    let sale = command_handlers::handle_create_sale(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        state.cache.as_ref(),
        state.cache_write_policy,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

/// GET /flash-sales
async fn list_sales(State(state): State<AppState>) -> Result<Json<Vec<Sale>>, ApiError> {
    let sales = query_handlers::list_sales(state.store.as_ref(), state.cache.as_ref()).await?;
    Ok(Json(sales))
}

/// PUT /flash-sales
#[instrument(skip(state, request), fields(sale_id = request.id))]
async fn update_sale(
    State(state): State<AppState>,
    Json(request): Json<UpdateSaleRequest>,
) -> Result<Json<Sale>, ApiError> {
    let command = commands::UpdateSale {
        correlation_id: Uuid::new_v4(),
        sale_id: request.id,
        changes: SaleChanges {
            discount: request.discount,
            sale_stock: request.sale_stock,
            start_time: request.start_time,
            end_time: request.end_time,
            active: request.active,
        },
    };

    info!(correlation_id = %command.correlation_id, "handling update_sale command");

    let sale = command_handlers::handle_update_sale(
        &command,
        state.store.as_ref(),
        state.cache.as_ref(),
        state.cache_write_policy,
    )
    .await?;

    Ok(Json(sale))
}

/// GET /flash-sales/{id}
async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> Result<Json<Sale>, ApiError> {
    let sale =
        query_handlers::get_sale(sale_id, state.store.as_ref(), state.cache.as_ref()).await?;
    Ok(Json(sale))
}

/// DELETE /flash-sales/{id}
#[instrument(skip(state))]
async fn delete_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> Result<Json<Sale>, ApiError> {
    let command = commands::DeleteSale {
        correlation_id: Uuid::new_v4(),
        sale_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_sale command");

    let sale = command_handlers::handle_delete_sale(
        &command,
        state.store.as_ref(),
        state.cache.as_ref(),
        state.cache_write_policy,
    )
    .await?;

    Ok(Json(sale))
}

/// POST /flash-sales/{id}/buy
#[instrument(skip(state, params))]
async fn buy(
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
    Query(params): Query<BuyParams>,
) -> Result<Json<BuyResponse>, ApiError> {
    let processing_delay = match params.wait {
        None => state.purchase.default_wait,
        Some(secs) if Duration::from_secs(secs) <= state.purchase.max_wait => {
            Duration::from_secs(secs)
        }
        Some(secs) => {
            return Err(DomainError::Validation(format!(
                "wait must be at most {} seconds, got {secs}",
                state.purchase.max_wait.as_secs()
            ))
            .into());
        }
    };
    let command = commands::PurchaseSale {
        correlation_id: Uuid::new_v4(),
        sale_id,
        processing_delay,
    };

    info!(correlation_id = %command.correlation_id, "handling purchase command");

    let log = purchase::handle_purchase(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        state.cache.as_ref(),
        state.processor.as_ref(),
        state.cache_write_policy,
    )
    .await?;

    Ok(Json(BuyResponse {
        product_id: log.product_id,
        remaining_sale_stock: log.remaining_sale_stock,
        remaining_product_stock: log.remaining_product_stock,
        price: log.price,
        time: log.created_at,
    }))
}

/// Returns the router for flash sales.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale).get(list_sales).put(update_sale))
        .route("/{id}", get(get_sale).delete(delete_sale))
        .route("/{id}/buy", post(buy))
}
