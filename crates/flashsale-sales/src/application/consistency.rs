//! Staleness detection between an in-hand snapshot and the cache.
//!
//! Another purchase refreshes the cache right after it commits, so a cached
//! `updated_at` that differs from the one in hand means the snapshot is out
//! of date. The replacement always comes from the store.

use flashsale_core::entity::{Product, Sale};
use flashsale_core::error::DomainError;
use tracing::debug;

use crate::application::cache_aside::CacheAside;

/// Returns `in_hand`, or a fresh store read if the cache has seen a newer
/// version.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the product disappeared and
/// `DomainError::Persistence` if the store read fails.
pub async fn reconcile_product(
    accessor: &CacheAside<'_>,
    in_hand: Product,
) -> Result<Product, DomainError> {
    let Some(cached) = accessor.cached_product(in_hand.id).await else {
        return Ok(in_hand);
    };
    if cached.updated_at == in_hand.updated_at {
        return Ok(in_hand);
    }
    debug!(product_id = in_hand.id, "product snapshot is stale, re-reading");
    accessor
        .fresh_product(in_hand.id)
        .await?
        .ok_or_else(|| DomainError::product_not_found(in_hand.id))
}

/// Returns `in_hand`, or a fresh store read if the cache has seen a newer
/// version.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the sale disappeared and
/// `DomainError::Persistence` if the store read fails.
pub async fn reconcile_sale(accessor: &CacheAside<'_>, in_hand: Sale) -> Result<Sale, DomainError> {
    let Some(cached) = accessor.cached_sale(in_hand.id).await else {
        return Ok(in_hand);
    };
    if cached.updated_at == in_hand.updated_at {
        return Ok(in_hand);
    }
    debug!(sale_id = in_hand.id, "sale snapshot is stale, re-reading");
    accessor
        .fresh_sale(in_hand.id)
        .await?
        .ok_or_else(|| DomainError::sale_not_found(in_hand.id))
}
