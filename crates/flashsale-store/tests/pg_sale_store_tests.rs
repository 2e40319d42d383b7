//! Integration tests for `PgSaleStore`.
//!
//! Run with `--features postgres-tests` and a `DATABASE_URL` pointing at a
//! disposable PostgreSQL instance.
#![cfg(feature = "postgres-tests")]

use std::time::Duration;

use chrono::Utc;
use flashsale_core::entity::{NewProduct, NewSale, NewSaleLog, SaleChanges};
use flashsale_core::error::DomainError;
use flashsale_core::repository::SaleStore;
use flashsale_store::PgSaleStore;
use rust_decimal::Decimal;
use sqlx::PgPool;

fn store(pool: PgPool) -> PgSaleStore {
    PgSaleStore::new(pool, Duration::from_millis(200))
}

async fn seed(store: &PgSaleStore, stock: i32, sale_stock: i32) -> (i64, i64) {
    let product = store
        .insert_product(NewProduct {
            name: "Iphone 16".into(),
            price: Decimal::new(5000, 2),
            stock,
        })
        .await
        .unwrap();
    let now = Utc::now();
    let sale = store
        .insert_sale(NewSale {
            product_id: product.id,
            sale_stock,
            discount: Decimal::from(10),
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
        })
        .await
        .unwrap();
    (product.id, sale.id)
}

// --- products ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_product_returns_none_for_unknown_id(pool: PgPool) {
    let store = store(pool);

    assert!(store.find_product(12345).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_insert_product_rejects_negative_stock(pool: PgPool) {
    let store = store(pool);

    let result = store
        .insert_product(NewProduct {
            name: "Broken".into(),
            price: Decimal::ONE,
            stock: -1,
        })
        .await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
}

// --- sales ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_insert_sale_starts_inactive(pool: PgPool) {
    let store = store(pool);
    let (_, sale_id) = seed(&store, 5, 3).await;

    let sale = store.find_sale(sale_id).await.unwrap().unwrap();

    assert!(!sale.active);
    assert_eq!(sale.sale_stock, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_second_sale_for_product_is_already_exists(pool: PgPool) {
    let store = store(pool);
    let (product_id, _) = seed(&store, 5, 3).await;
    let now = Utc::now();

    let result = store
        .insert_sale(NewSale {
            product_id,
            sale_stock: 1,
            discount: Decimal::from(5),
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
        })
        .await;

    assert!(matches!(result, Err(DomainError::AlreadyExists(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_sale_only_touches_given_columns(pool: PgPool) {
    let store = store(pool);
    let (_, sale_id) = seed(&store, 5, 3).await;
    let before = store.find_sale(sale_id).await.unwrap().unwrap();

    let after = store
        .update_sale(
            sale_id,
            SaleChanges {
                active: Some(true),
                ..SaleChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert!(after.active);
    assert_eq!(after.sale_stock, before.sale_stock);
    assert_eq!(after.discount, before.discount);
    assert!(after.updated_at > before.updated_at);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_sale_returns_deleted_row(pool: PgPool) {
    let store = store(pool);
    let (_, sale_id) = seed(&store, 5, 3).await;

    let deleted = store.delete_sale(sale_id).await.unwrap();

    assert_eq!(deleted.map(|s| s.id), Some(sale_id));
    assert!(store.find_sale(sale_id).await.unwrap().is_none());
}

// --- purchase transactions ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_committed_purchase_decrements_and_logs(pool: PgPool) {
    let store = store(pool);
    let (product_id, sale_id) = seed(&store, 5, 3).await;

    let mut tx = store.begin_purchase().await.unwrap();
    tx.lock_for_purchase(product_id, sale_id).await.unwrap();
    let rows = tx.decrement_stock(product_id, sale_id).await.unwrap();
    tx.insert_sale_log(NewSaleLog {
        product_id,
        remaining_sale_stock: rows.sale.sale_stock,
        remaining_product_stock: rows.product.stock,
        price: Decimal::new(4500, 2),
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(store.find_product(product_id).await.unwrap().unwrap().stock, 4);
    assert_eq!(store.find_sale(sale_id).await.unwrap().unwrap().sale_stock, 2);
    let logs = store.list_sale_logs(product_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].remaining_sale_stock, 2);
    assert_eq!(logs[0].price, Decimal::new(4500, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_rolled_back_purchase_leaves_no_trace(pool: PgPool) {
    let store = store(pool);
    let (product_id, sale_id) = seed(&store, 5, 3).await;

    let mut tx = store.begin_purchase().await.unwrap();
    tx.lock_for_purchase(product_id, sale_id).await.unwrap();
    tx.decrement_stock(product_id, sale_id).await.unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(store.find_product(product_id).await.unwrap().unwrap().stock, 5);
    assert_eq!(store.find_sale(sale_id).await.unwrap().unwrap().sale_stock, 3);
    assert!(store.list_sale_logs(product_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_lock_wait_times_out_while_another_purchase_holds_rows(pool: PgPool) {
    let store = store(pool);
    let (product_id, sale_id) = seed(&store, 5, 3).await;

    let mut holder = store.begin_purchase().await.unwrap();
    holder.lock_for_purchase(product_id, sale_id).await.unwrap();

    let mut waiter = store.begin_purchase().await.unwrap();
    let result = waiter.lock_for_purchase(product_id, sale_id).await;

    assert!(matches!(result, Err(DomainError::Persistence(_))));
    holder.rollback().await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_stock_check_constraint_blocks_negative_stock(pool: PgPool) {
    let store = store(pool);
    let (product_id, sale_id) = seed(&store, 0, 3).await;

    let mut tx = store.begin_purchase().await.unwrap();
    tx.lock_for_purchase(product_id, sale_id).await.unwrap();
    let result = tx.decrement_stock(product_id, sale_id).await;

    assert!(matches!(result, Err(DomainError::Persistence(_))));
}
