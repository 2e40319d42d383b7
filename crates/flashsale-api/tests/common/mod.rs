//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use flashsale_api::config::PurchaseSettings;
use flashsale_api::state::AppState;
use flashsale_core::cache::Cache;
use flashsale_core::clock::Clock;
use flashsale_core::entity::{NewProduct, Product};
use flashsale_core::repository::SaleStore;
use flashsale_sales::application::cache_aside::CacheWritePolicy;
use flashsale_sales::application::purchase::SimulatedProcessor;
use flashsale_test_support::{FaultyCache, FaultyStore, FixedClock};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use tower::ServiceExt;

/// Fixed timestamp used across all integration tests.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// In-process backends plus the state built over them. Every call to
/// `router` shares the same store and cache.
pub struct TestApp {
    pub store: FaultyStore,
    pub cache: Arc<FaultyCache>,
    state: AppState,
}

impl TestApp {
    /// Backends with a fixed clock, no processing delay, and a strict cache
    /// policy.
    pub fn new() -> Self {
        let store = FaultyStore::new();
        let cache = Arc::new(FaultyCache::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(fixed_now()));
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::clone(&cache) as Arc<dyn Cache>,
            clock,
            Arc::new(SimulatedProcessor),
            CacheWritePolicy::Strict,
            PurchaseSettings {
                default_wait: Duration::ZERO,
                max_wait: Duration::from_secs(30),
            },
        );
        Self {
            store,
            cache,
            state,
        }
    }

    /// Build the full app router. Uses the same route structure as `main.rs`.
    pub fn router(&self) -> Router {
        flashsale_api::build_router(self.state.clone())
    }

    /// Insert a product directly into the store.
    pub async fn product(&self, stock: i32) -> Product {
        self.store
            .insert_product(NewProduct {
                name: "Iphone 16".to_owned(),
                price: Decimal::from(50),
                stock,
            })
            .await
            .unwrap()
    }

    /// Create a sale through the API and activate it. Returns the sale id.
    pub async fn active_sale(&self, product_id: i64, sale_stock: i32) -> i64 {
        let (status, json) = post_json(
            self.router(),
            "/api/v1/flash-sales",
            &serde_json::json!({
                "productId": product_id,
                "saleStock": sale_stock,
                "discount": 10,
                "startTime": "2026-01-15T09:00:00Z",
                "endTime": "2026-01-15T12:00:00Z"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        let sale_id = json["id"].as_i64().unwrap();

        let (status, json) = put_json(
            self.router(),
            "/api/v1/flash-sales",
            &serde_json::json!({ "id": sale_id, "active": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        sale_id
    }
}

/// Send a request with an optional JSON body and return the status and the
/// parsed body (`Null` when the body is not JSON).
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "PUT", uri, Some(body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

/// Send a DELETE request and return the response.
pub async fn delete_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "DELETE", uri, None).await
}

/// Send a bodyless POST request and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, None).await
}
