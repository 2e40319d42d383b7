//! Command handlers for sale and product administration.
//!
//! Each handler validates its command, writes through the store, and then
//! refreshes the affected cache entries under the configured
//! `CacheWritePolicy`.

use flashsale_core::cache::Cache;
use flashsale_core::clock::Clock;
use flashsale_core::entity::{NewProduct, NewSale, Product, Sale};
use flashsale_core::error::DomainError;
use flashsale_core::repository::SaleStore;
use rust_decimal::Decimal;

use crate::application::cache_aside::{CacheAside, CacheWritePolicy};
use crate::domain::commands::{CreateProduct, CreateSale, DeleteSale, UpdateSale};

fn check_discount(discount: Decimal) -> Result<(), DomainError> {
    if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(DomainError::Validation(
            "discount must be between 0 and 100".into(),
        ));
    }
    Ok(())
}

/// Handles the `CreateSale` command: opens an inactive sale on a product
/// that has stock and no sale yet.
///
/// # Errors
///
/// - `DomainError::Validation` for a bad stock, discount or window, or if the
///   product has no stock.
/// - `DomainError::NotFound` if the product does not exist.
/// - `DomainError::AlreadyExists` if the product already has a sale.
/// - `DomainError::Cache` if the cache refresh fails under
///   `CacheWritePolicy::Strict`.
pub async fn handle_create_sale(
    command: &CreateSale,
    clock: &dyn Clock,
    store: &dyn SaleStore,
    cache: &dyn Cache,
    write_policy: CacheWritePolicy,
) -> Result<Sale, DomainError> {
    if command.sale_stock < 1 {
        return Err(DomainError::Validation(
            "sale stock must be at least 1".into(),
        ));
    }
    check_discount(command.discount)?;
    if command.start_time >= command.end_time {
        return Err(DomainError::Validation(
            "sale window must start before it ends".into(),
        ));
    }
    if command.end_time <= clock.now() {
        return Err(DomainError::Validation(
            "sale window has already ended".into(),
        ));
    }

    let accessor = CacheAside::new(store, cache, write_policy);
    let product = accessor
        .fresh_product(command.product_id)
        .await?
        .ok_or_else(|| DomainError::product_not_found(command.product_id))?;
    if product.stock <= 0 {
        return Err(DomainError::Validation(format!(
            "product {} has no stock",
            product.id
        )));
    }
    if store.find_sale_by_product(product.id).await?.is_some() {
        return Err(DomainError::AlreadyExists(format!(
            "flash sale for product {}",
            product.id
        )));
    }

    let sale = store
        .insert_sale(NewSale {
            product_id: product.id,
            sale_stock: command.sale_stock,
            discount: command.discount,
            start_time: command.start_time,
            end_time: command.end_time,
        })
        .await?;
    accessor.refresh_sale(&sale).await?;
    Ok(sale)
}

/// Handles the `UpdateSale` command: applies the given fields to the current
/// row in one store write.
///
/// # Errors
///
/// - `DomainError::Validation` if no field is given, a field is out of range,
///   or the merged window is inverted.
/// - `DomainError::NotFound` if the sale does not exist.
/// - `DomainError::Cache` if the cache refresh fails under
///   `CacheWritePolicy::Strict`.
pub async fn handle_update_sale(
    command: &UpdateSale,
    store: &dyn SaleStore,
    cache: &dyn Cache,
    write_policy: CacheWritePolicy,
) -> Result<Sale, DomainError> {
    let changes = &command.changes;
    if changes.is_empty() {
        return Err(DomainError::Validation("no fields to update".into()));
    }
    if changes.sale_stock.is_some_and(|stock| stock < 0) {
        return Err(DomainError::Validation(
            "sale stock must not be negative".into(),
        ));
    }
    if let Some(discount) = changes.discount {
        check_discount(discount)?;
    }
    if let (Some(start), Some(end)) = (changes.start_time, changes.end_time) {
        if start >= end {
            return Err(DomainError::Validation(
                "sale window must start before it ends".into(),
            ));
        }
    }

    let sale = store
        .update_sale(command.sale_id, changes.clone())
        .await?
        .ok_or_else(|| DomainError::sale_not_found(command.sale_id))?;
    CacheAside::new(store, cache, write_policy)
        .refresh_sale(&sale)
        .await?;
    Ok(sale)
}

/// Handles the `DeleteSale` command and returns the deleted sale.
///
/// # Errors
///
/// - `DomainError::NotFound` if the sale does not exist.
/// - `DomainError::Cache` if the cache eviction fails under
///   `CacheWritePolicy::Strict`.
pub async fn handle_delete_sale(
    command: &DeleteSale,
    store: &dyn SaleStore,
    cache: &dyn Cache,
    write_policy: CacheWritePolicy,
) -> Result<Sale, DomainError> {
    let sale = store
        .delete_sale(command.sale_id)
        .await?
        .ok_or_else(|| DomainError::sale_not_found(command.sale_id))?;
    CacheAside::new(store, cache, write_policy)
        .evict_sale(sale.id)
        .await?;
    Ok(sale)
}

/// Handles the `CreateProduct` command and writes the new product through to
/// the cache.
///
/// # Errors
///
/// - `DomainError::Validation` on an empty name, negative price or negative
///   stock.
/// - `DomainError::Cache` if the cache write fails under
///   `CacheWritePolicy::Strict`.
pub async fn handle_create_product(
    command: &CreateProduct,
    store: &dyn SaleStore,
    cache: &dyn Cache,
    write_policy: CacheWritePolicy,
) -> Result<Product, DomainError> {
    if command.name.trim().is_empty() {
        return Err(DomainError::Validation(
            "product name must not be empty".into(),
        ));
    }
    if command.price < Decimal::ZERO {
        return Err(DomainError::Validation(
            "price must not be negative".into(),
        ));
    }
    if command.stock < 0 {
        return Err(DomainError::Validation(
            "stock must not be negative".into(),
        ));
    }

    let product = store
        .insert_product(NewProduct {
            name: command.name.trim().to_owned(),
            price: command.price,
            stock: command.stock,
        })
        .await?;
    CacheAside::new(store, cache, write_policy)
        .refresh_product(&product)
        .await?;
    Ok(product)
}

/// Inserts the two demo products used for manual testing.
///
/// # Errors
///
/// Returns `DomainError::Persistence` if an insert fails.
pub async fn seed_demo_products(store: &dyn SaleStore) -> Result<Vec<Product>, DomainError> {
    let demo = [
        ("Iphone 16", Decimal::from(50), 10),
        ("Iphone 17", Decimal::from(100), 20),
    ];
    let mut products = Vec::with_capacity(demo.len());
    for (name, price, stock) in demo {
        products.push(
            store
                .insert_product(NewProduct {
                    name: name.to_owned(),
                    price,
                    stock,
                })
                .await?,
        );
    }
    Ok(products)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use flashsale_cache::InMemoryCache;
    use flashsale_core::cache::{SALES_KEY, product_key, sale_key};
    use flashsale_core::entity::SaleChanges;
    use flashsale_store::InMemorySaleStore;
    use flashsale_test_support::{FaultyCache, FixedClock};
    use uuid::Uuid;

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn create_sale(product_id: i64) -> CreateSale {
        CreateSale {
            correlation_id: Uuid::new_v4(),
            product_id,
            sale_stock: 5,
            discount: Decimal::from(20),
            start_time: fixed_now(),
            end_time: fixed_now() + Duration::hours(2),
        }
    }

    async fn product_with_stock(store: &InMemorySaleStore, stock: i32) -> Product {
        store
            .insert_product(NewProduct {
                name: "Iphone 16".to_owned(),
                price: Decimal::from(50),
                stock,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_handle_create_sale_persists_inactive_sale_and_caches_it() {
        // Arrange
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        cache.set(SALES_KEY, "[]".to_owned()).await.unwrap();
        let product = product_with_stock(&store, 10).await;

        // Act
        let sale = handle_create_sale(
            &create_sale(product.id),
            &FixedClock(fixed_now()),
            &store,
            &cache,
            CacheWritePolicy::Strict,
        )
        .await
        .unwrap();

        // Assert
        assert!(!sale.active);
        assert_eq!(sale.product_id, product.id);
        assert_eq!(sale.sale_stock, 5);
        let cached: Sale =
            serde_json::from_str(&cache.get(&sale_key(sale.id)).await.unwrap().unwrap()).unwrap();
        assert_eq!(cached, sale);
        assert_eq!(cache.get(SALES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_handle_create_sale_rejects_second_sale_for_product() {
        // Arrange
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let product = product_with_stock(&store, 10).await;
        let clock = FixedClock(fixed_now());
        handle_create_sale(
            &create_sale(product.id),
            &clock,
            &store,
            &cache,
            CacheWritePolicy::Strict,
        )
        .await
        .unwrap();

        // Act
        let result = handle_create_sale(
            &create_sale(product.id),
            &clock,
            &store,
            &cache,
            CacheWritePolicy::Strict,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_handle_create_sale_rejects_product_without_stock() {
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let product = product_with_stock(&store, 0).await;

        let result = handle_create_sale(
            &create_sale(product.id),
            &FixedClock(fixed_now()),
            &store,
            &cache,
            CacheWritePolicy::Strict,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_handle_create_sale_for_missing_product_is_not_found() {
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();

        let result = handle_create_sale(
            &create_sale(42),
            &FixedClock(fixed_now()),
            &store,
            &cache,
            CacheWritePolicy::Strict,
        )
        .await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "product",
                id: 42
            })
        ));
    }

    #[tokio::test]
    async fn test_handle_create_sale_validates_fields() {
        // Arrange
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let product = product_with_stock(&store, 10).await;
        let clock = FixedClock(fixed_now());
        let base = create_sale(product.id);
        let invalid = [
            CreateSale {
                sale_stock: 0,
                ..base.clone()
            },
            CreateSale {
                discount: Decimal::from(101),
                ..base.clone()
            },
            CreateSale {
                discount: Decimal::from(-1),
                ..base.clone()
            },
            CreateSale {
                end_time: base.start_time,
                ..base.clone()
            },
            CreateSale {
                start_time: fixed_now() - Duration::hours(3),
                end_time: fixed_now() - Duration::hours(1),
                ..base.clone()
            },
        ];

        for command in &invalid {
            // Act
            let result =
                handle_create_sale(command, &clock, &store, &cache, CacheWritePolicy::Strict).await;

            // Assert
            assert!(
                matches!(result, Err(DomainError::Validation(_))),
                "expected validation error for {command:?}, got {result:?}"
            );
        }
        assert!(store.list_sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_update_sale_changes_only_given_fields() {
        // Arrange
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let product = product_with_stock(&store, 10).await;
        let sale = handle_create_sale(
            &create_sale(product.id),
            &FixedClock(fixed_now()),
            &store,
            &cache,
            CacheWritePolicy::Strict,
        )
        .await
        .unwrap();
        let command = UpdateSale {
            correlation_id: Uuid::new_v4(),
            sale_id: sale.id,
            changes: SaleChanges {
                active: Some(true),
                ..SaleChanges::default()
            },
        };

        // Act
        let updated = handle_update_sale(&command, &store, &cache, CacheWritePolicy::Strict)
            .await
            .unwrap();

        // Assert
        assert!(updated.active);
        assert_eq!(updated.sale_stock, sale.sale_stock);
        assert_eq!(updated.discount, sale.discount);
        assert!(updated.updated_at > sale.updated_at);
        let cached: Sale =
            serde_json::from_str(&cache.get(&sale_key(sale.id)).await.unwrap().unwrap()).unwrap();
        assert_eq!(cached, updated);
    }

    #[tokio::test]
    async fn test_handle_update_sale_rejects_empty_changes() {
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let command = UpdateSale {
            correlation_id: Uuid::new_v4(),
            sale_id: 1,
            changes: SaleChanges::default(),
        };

        let result = handle_update_sale(&command, &store, &cache, CacheWritePolicy::Strict).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_handle_update_sale_rejects_window_inverted_by_merge() {
        // Arrange
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let product = product_with_stock(&store, 10).await;
        let sale = handle_create_sale(
            &create_sale(product.id),
            &FixedClock(fixed_now()),
            &store,
            &cache,
            CacheWritePolicy::Strict,
        )
        .await
        .unwrap();
        let command = UpdateSale {
            correlation_id: Uuid::new_v4(),
            sale_id: sale.id,
            changes: SaleChanges {
                start_time: Some(sale.end_time + Duration::minutes(1)),
                ..SaleChanges::default()
            },
        };

        // Act
        let result = handle_update_sale(&command, &store, &cache, CacheWritePolicy::Strict).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.find_sale(sale.id).await.unwrap().unwrap(), sale);
    }

    #[tokio::test]
    async fn test_handle_update_sale_for_missing_sale_is_not_found() {
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let command = UpdateSale {
            correlation_id: Uuid::new_v4(),
            sale_id: 9,
            changes: SaleChanges {
                discount: Some(Decimal::from(5)),
                ..SaleChanges::default()
            },
        };

        let result = handle_update_sale(&command, &store, &cache, CacheWritePolicy::Strict).await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "sale",
                id: 9
            })
        ));
    }

    #[tokio::test]
    async fn test_handle_delete_sale_returns_sale_and_evicts_cache() {
        // Arrange
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let product = product_with_stock(&store, 10).await;
        let sale = handle_create_sale(
            &create_sale(product.id),
            &FixedClock(fixed_now()),
            &store,
            &cache,
            CacheWritePolicy::Strict,
        )
        .await
        .unwrap();
        cache.set(SALES_KEY, "[]".to_owned()).await.unwrap();
        let command = DeleteSale {
            correlation_id: Uuid::new_v4(),
            sale_id: sale.id,
        };

        // Act
        let deleted = handle_delete_sale(&command, &store, &cache, CacheWritePolicy::Strict)
            .await
            .unwrap();

        // Assert
        assert_eq!(deleted, sale);
        assert!(store.find_sale(sale.id).await.unwrap().is_none());
        assert_eq!(cache.get(&sale_key(sale.id)).await.unwrap(), None);
        assert_eq!(cache.get(SALES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_handle_delete_sale_for_missing_sale_is_not_found() {
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let command = DeleteSale {
            correlation_id: Uuid::new_v4(),
            sale_id: 3,
        };

        let result = handle_delete_sale(&command, &store, &cache, CacheWritePolicy::Strict).await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_handle_create_product_writes_through_to_cache() {
        // Arrange
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let command = CreateProduct {
            correlation_id: Uuid::new_v4(),
            name: "  Iphone 17 ".to_owned(),
            price: Decimal::new(9999, 2),
            stock: 20,
        };

        // Act
        let product = handle_create_product(&command, &store, &cache, CacheWritePolicy::Strict)
            .await
            .unwrap();

        // Assert
        assert_eq!(product.name, "Iphone 17");
        let cached: Product =
            serde_json::from_str(&cache.get(&product_key(product.id)).await.unwrap().unwrap())
                .unwrap();
        assert_eq!(cached, product);
    }

    #[tokio::test]
    async fn test_handle_create_product_validates_fields() {
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let base = CreateProduct {
            correlation_id: Uuid::new_v4(),
            name: "Iphone 17".to_owned(),
            price: Decimal::from(100),
            stock: 20,
        };
        let invalid = [
            CreateProduct {
                name: "   ".to_owned(),
                ..base.clone()
            },
            CreateProduct {
                price: Decimal::from(-1),
                ..base.clone()
            },
            CreateProduct {
                stock: -1,
                ..base.clone()
            },
        ];

        for command in &invalid {
            let result =
                handle_create_product(command, &store, &cache, CacheWritePolicy::Strict).await;

            assert!(matches!(result, Err(DomainError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_handle_create_product_strict_cache_failure_is_reported() {
        let store = InMemorySaleStore::new();
        let cache = FaultyCache::unavailable();
        let command = CreateProduct {
            correlation_id: Uuid::new_v4(),
            name: "Iphone 17".to_owned(),
            price: Decimal::from(100),
            stock: 20,
        };

        let result = handle_create_product(&command, &store, &cache, CacheWritePolicy::Strict).await;

        assert!(matches!(result, Err(DomainError::Cache(_))));
    }

    #[tokio::test]
    async fn test_seed_demo_products_inserts_both_phones() {
        let store = InMemorySaleStore::new();

        let products = seed_demo_products(&store).await.unwrap();

        let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Iphone 16", "Iphone 17"]);
        assert_eq!(products[0].stock, 10);
        assert_eq!(products[1].price, Decimal::from(100));
    }
}
