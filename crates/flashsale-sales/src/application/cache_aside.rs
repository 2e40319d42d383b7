//! Cache-aside reads and post-mutation cache refresh.
//!
//! Reads never surface cache errors: an unreachable cache or a malformed
//! entry is a miss. Writes that follow a committed mutation go through a
//! `CacheWritePolicy`, which decides whether a failed refresh fails the
//! request. Every key a refresh covers is attempted even after an earlier
//! one fails.
//!
//! Read-through population never replaces a cached snapshot that carries a
//! newer `updated_at` than the one being written.

use chrono::{DateTime, Utc};
use flashsale_core::cache::{Cache, SALES_KEY, product_key, sale_key};
use flashsale_core::entity::{Product, Sale};
use flashsale_core::error::DomainError;
use flashsale_core::repository::SaleStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// What to do when refreshing the cache after a committed mutation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheWritePolicy {
    /// Return `DomainError::Cache` to the caller.
    #[default]
    Strict,
    /// Log the failure and report success.
    LogAndContinue,
}

/// A row snapshot carrying its version marker.
trait Versioned {
    fn version(&self) -> DateTime<Utc>;
}

impl Versioned for Product {
    fn version(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Versioned for Sale {
    fn version(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Store and cache viewed together.
pub struct CacheAside<'a> {
    store: &'a dyn SaleStore,
    cache: &'a dyn Cache,
    write_policy: CacheWritePolicy,
}

impl<'a> CacheAside<'a> {
    /// Pairs a store with its side cache.
    #[must_use]
    pub fn new(
        store: &'a dyn SaleStore,
        cache: &'a dyn Cache,
        write_policy: CacheWritePolicy,
    ) -> Self {
        Self {
            store,
            cache,
            write_policy,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &'a dyn SaleStore {
        self.store
    }

    /// Reads a product, preferring the cache.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` if the cache misses and the store
    /// read fails.
    pub async fn product(&self, id: i64) -> Result<Option<Product>, DomainError> {
        let key = product_key(id);
        if let Some(product) = self.read_cached(&key).await {
            return Ok(Some(product));
        }
        let product = self.store.find_product(id).await?;
        if let Some(product) = &product {
            self.populate_versioned(&key, product).await;
        }
        Ok(product)
    }

    /// Reads a sale, preferring the cache.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` if the cache misses and the store
    /// read fails.
    pub async fn sale(&self, id: i64) -> Result<Option<Sale>, DomainError> {
        let key = sale_key(id);
        if let Some(sale) = self.read_cached(&key).await {
            return Ok(Some(sale));
        }
        let sale = self.store.find_sale(id).await?;
        if let Some(sale) = &sale {
            self.populate_versioned(&key, sale).await;
        }
        Ok(sale)
    }

    /// Reads the full sale listing, preferring the cache.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` if the cache misses and the store
    /// read fails.
    pub async fn sales(&self) -> Result<Vec<Sale>, DomainError> {
        if let Some(sales) = self.read_cached(SALES_KEY).await {
            return Ok(sales);
        }
        let sales = self.store.list_sales().await?;
        self.populate(SALES_KEY, &sales).await;
        Ok(sales)
    }

    /// Reads a product from the store, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` if the store read fails.
    pub async fn fresh_product(&self, id: i64) -> Result<Option<Product>, DomainError> {
        self.store.find_product(id).await
    }

    /// Reads a sale from the store, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` if the store read fails.
    pub async fn fresh_sale(&self, id: i64) -> Result<Option<Sale>, DomainError> {
        self.store.find_sale(id).await
    }

    /// The cached product snapshot, if one can be read.
    pub async fn cached_product(&self, id: i64) -> Option<Product> {
        self.read_cached(&product_key(id)).await
    }

    /// The cached sale snapshot, if one can be read.
    pub async fn cached_sale(&self, id: i64) -> Option<Sale> {
        self.read_cached(&sale_key(id)).await
    }

    /// Best-effort write of a product read from the store, skipped when the
    /// cache already holds a newer snapshot.
    pub async fn remember_product(&self, product: &Product) {
        self.populate_versioned(&product_key(product.id), product).await;
    }

    /// Best-effort write of a sale read from the store, skipped when the
    /// cache already holds a newer snapshot.
    pub async fn remember_sale(&self, sale: &Sale) {
        self.populate_versioned(&sale_key(sale.id), sale).await;
    }

    /// Replaces the cached snapshot of `product`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Cache` under `CacheWritePolicy::Strict` if the
    /// cache cannot be updated.
    pub async fn refresh_product(&self, product: &Product) -> Result<(), DomainError> {
        let key = product_key(product.id);
        let result = self.replace(&key, product).await;
        self.enforce(&key, result)
    }

    /// Replaces the cached snapshot of `sale` and drops the sale listing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Cache` under `CacheWritePolicy::Strict` if the
    /// cache cannot be updated.
    pub async fn refresh_sale(&self, sale: &Sale) -> Result<(), DomainError> {
        let key = sale_key(sale.id);
        let entry = self.replace(&key, sale).await;
        let listing = self.cache.delete(SALES_KEY).await;
        let entry = self.enforce(&key, entry);
        let listing = self.enforce(SALES_KEY, listing);
        entry.and(listing)
    }

    /// Drops the cached snapshot of a sale and the sale listing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Cache` under `CacheWritePolicy::Strict` if the
    /// cache cannot be updated.
    pub async fn evict_sale(&self, id: i64) -> Result<(), DomainError> {
        let key = sale_key(id);
        let entry = self.cache.delete(&key).await;
        let listing = self.cache.delete(SALES_KEY).await;
        let entry = self.enforce(&key, entry);
        let listing = self.enforce(SALES_KEY, listing);
        entry.and(listing)
    }

    async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "malformed cache entry, treating as miss");
                None
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &str, value: &T) {
        let result = match serde_json::to_string(value) {
            Ok(json) => self.cache.set(key, json).await,
            Err(e) => Err(DomainError::Cache(e.to_string())),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "failed to populate cache");
        }
    }

    // Not atomic: a concurrent writer can still land between the read and
    // the set, but an older snapshot never knowingly replaces a newer one.
    async fn populate_versioned<T>(&self, key: &str, value: &T)
    where
        T: Serialize + DeserializeOwned + Versioned,
    {
        if let Some(cached) = self.read_cached::<T>(key).await {
            if cached.version() > value.version() {
                debug!(key, "cache holds a newer snapshot, not populating");
                return;
            }
        }
        self.populate(key, value).await;
    }

    // Delete first so that a failed set leaves a miss rather than the old
    // snapshot.
    async fn replace<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DomainError> {
        let json = serde_json::to_string(value).map_err(|e| DomainError::Cache(e.to_string()))?;
        self.cache.delete(key).await?;
        self.cache.set(key, json).await
    }

    fn enforce(&self, key: &str, result: Result<(), DomainError>) -> Result<(), DomainError> {
        match (result, self.write_policy) {
            (Ok(()), _) => Ok(()),
            (Err(e), CacheWritePolicy::Strict) => Err(match e {
                DomainError::Cache(_) => e,
                other => DomainError::Cache(other.to_string()),
            }),
            (Err(e), CacheWritePolicy::LogAndContinue) => {
                warn!(key, error = %e, "cache refresh failed after commit");
                Ok(())
            }
        }
    }
}
