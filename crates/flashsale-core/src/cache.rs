//! Side-cache abstraction and key scheme.
//!
//! Values are JSON strings. Keys must stay bit-for-bit compatible with caches
//! populated by earlier deployments: `PRODUCT:<id>`, `SALE:<id>` and `SALES`.

use async_trait::async_trait;

use crate::error::DomainError;

/// Key under which the full sale listing is cached.
pub const SALES_KEY: &str = "SALES";

/// Cache key for a product snapshot.
#[must_use]
pub fn product_key(id: i64) -> String {
    format!("PRODUCT:{id}")
}

/// Cache key for a sale snapshot.
#[must_use]
pub fn sale_key(id: i64) -> String {
    format!("SALE:{id}")
}

/// String-keyed cache without expiry.
///
/// Implementations report backend failures as `DomainError::Cache`; whether
/// that error reaches a caller is decided by the application layer.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the stored value, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), DomainError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), DomainError>;
}
