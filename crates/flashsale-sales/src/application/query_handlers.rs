//! Query handlers for sales, products and the purchase audit log.
//!
//! Sale and product reads go through the cache; audit entries are always
//! read from the store.

use flashsale_core::cache::Cache;
use flashsale_core::entity::{Product, Sale, SaleLog};
use flashsale_core::error::DomainError;
use flashsale_core::repository::SaleStore;

use crate::application::cache_aside::{CacheAside, CacheWritePolicy};

// Reads never write back through the policy, so any value works here.
fn reader<'a>(store: &'a dyn SaleStore, cache: &'a dyn Cache) -> CacheAside<'a> {
    CacheAside::new(store, cache, CacheWritePolicy::default())
}

/// Retrieves a sale by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the sale does not exist.
pub async fn get_sale(
    sale_id: i64,
    store: &dyn SaleStore,
    cache: &dyn Cache,
) -> Result<Sale, DomainError> {
    reader(store, cache)
        .sale(sale_id)
        .await?
        .ok_or_else(|| DomainError::sale_not_found(sale_id))
}

/// Lists every sale ordered by id.
///
/// # Errors
///
/// Returns `DomainError::Persistence` if the cache misses and the store
/// read fails.
pub async fn list_sales(store: &dyn SaleStore, cache: &dyn Cache) -> Result<Vec<Sale>, DomainError> {
    reader(store, cache).sales().await
}

/// Retrieves a product by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the product does not exist.
pub async fn get_product(
    product_id: i64,
    store: &dyn SaleStore,
    cache: &dyn Cache,
) -> Result<Product, DomainError> {
    reader(store, cache)
        .product(product_id)
        .await?
        .ok_or_else(|| DomainError::product_not_found(product_id))
}

/// Lists the audit entries of a product's purchases, oldest first.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the product does not exist.
pub async fn list_sale_logs(
    product_id: i64,
    store: &dyn SaleStore,
) -> Result<Vec<SaleLog>, DomainError> {
    if store.find_product(product_id).await?.is_none() {
        return Err(DomainError::product_not_found(product_id));
    }
    store.list_sale_logs(product_id).await
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use flashsale_cache::InMemoryCache;
    use flashsale_core::cache::sale_key;
    use flashsale_core::entity::{NewProduct, NewSale};
    use flashsale_store::InMemorySaleStore;
    use flashsale_test_support::FaultyStore;
    use rust_decimal::Decimal;

    use super::*;

    async fn seed(store: &dyn SaleStore) -> (Product, Sale) {
        let product = store
            .insert_product(NewProduct {
                name: "Iphone 16".to_owned(),
                price: Decimal::from(50),
                stock: 10,
            })
            .await
            .unwrap();
        let now = Utc::now();
        let sale = store
            .insert_sale(NewSale {
                product_id: product.id,
                sale_stock: 4,
                discount: Decimal::from(25),
                start_time: now,
                end_time: now + Duration::hours(1),
            })
            .await
            .unwrap();
        (product, sale)
    }

    #[tokio::test]
    async fn test_get_sale_returns_sale_and_caches_it() {
        // Arrange
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();
        let (_, sale) = seed(&store).await;

        // Act
        let found = get_sale(sale.id, &store, &cache).await.unwrap();

        // Assert
        assert_eq!(found, sale);
        assert!(cache.get(&sale_key(sale.id)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_sale_returns_not_found_for_unknown_id() {
        let store = InMemorySaleStore::new();
        let cache = InMemoryCache::new();

        let result = get_sale(5, &store, &cache).await;

        match result.unwrap_err() {
            DomainError::NotFound { entity, id } => {
                assert_eq!(entity, "sale");
                assert_eq!(id, 5);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_sales_is_served_from_cache_when_store_is_down() {
        // Arrange
        let store = FaultyStore::new();
        let cache = InMemoryCache::new();
        let (_, sale) = seed(&store).await;
        let first = list_sales(&store, &cache).await.unwrap();

        // Act
        store.fail_reads(true);
        let second = list_sales(&store, &cache).await.unwrap();

        // Assert
        assert_eq!(first, vec![sale]);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_get_product_surfaces_store_failure_on_miss() {
        let store = FaultyStore::new();
        let cache = InMemoryCache::new();
        let (product, _) = seed(&store).await;
        store.fail_reads(true);

        let result = get_product(product.id, &store, &cache).await;

        assert!(matches!(result, Err(DomainError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_list_sale_logs_for_unknown_product_is_not_found() {
        let store = InMemorySaleStore::new();

        let result = list_sale_logs(8, &store).await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_sale_logs_is_empty_before_any_purchase() {
        let store = InMemorySaleStore::new();
        let (product, _) = seed(&store).await;

        let logs = list_sale_logs(product.id, &store).await.unwrap();

        assert!(logs.is_empty());
    }
}
