//! The purchase protocol.
//!
//! A purchase reads the sale and its product through the cache, rejects
//! obviously doomed requests, runs the external processing step, reconciles
//! its snapshots against the cache, and then does the real work inside one
//! store transaction: lock product then sale, re-check eligibility on the
//! locked rows, decrement both counters, append the audit entry, commit.
//! The cache is refreshed only after the commit.

use async_trait::async_trait;
use flashsale_core::cache::Cache;
use flashsale_core::clock::Clock;
use flashsale_core::entity::{NewSaleLog, Product, Sale, SaleLog};
use flashsale_core::error::DomainError;
use flashsale_core::repository::{LockedRows, PurchaseTransaction, SaleStore};
use rust_decimal::Decimal;
use tracing::{Instrument, debug, error, info, info_span};

use crate::application::cache_aside::{CacheAside, CacheWritePolicy};
use crate::application::consistency::{reconcile_product, reconcile_sale};
use crate::domain::commands::PurchaseSale;
use crate::domain::eligibility::{check_eligibility, discounted_price};

/// The external step between deciding to sell and taking the lock, such as
/// payment authorization.
#[async_trait]
pub trait PurchaseProcessor: Send + Sync {
    /// Runs the step for `command` at the frozen `price`.
    ///
    /// # Errors
    ///
    /// Any error aborts the purchase before the store is touched.
    async fn process(&self, command: &PurchaseSale, price: Decimal) -> Result<(), DomainError>;
}

/// Stands in for real processing by sleeping for the requested delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedProcessor;

#[async_trait]
impl PurchaseProcessor for SimulatedProcessor {
    async fn process(&self, command: &PurchaseSale, _price: Decimal) -> Result<(), DomainError> {
        if !command.processing_delay.is_zero() {
            tokio::time::sleep(command.processing_delay).await;
        }
        Ok(())
    }
}

/// Handles the `PurchaseSale` command and returns the audit entry of the
/// unit sold.
///
/// # Errors
///
/// - `DomainError::NotFound` if the sale or its product does not exist.
/// - `DomainError::Ineligible` if the sale is inactive, ended, or either
///   stock counter is exhausted, whether detected before or under the lock.
/// - `DomainError::Persistence` if the transaction fails; nothing is
///   persisted in that case.
/// - `DomainError::Cache` if the post-commit cache refresh fails under
///   `CacheWritePolicy::Strict`. The purchase is committed regardless.
pub async fn handle_purchase(
    command: &PurchaseSale,
    clock: &dyn Clock,
    store: &dyn SaleStore,
    cache: &dyn Cache,
    processor: &dyn PurchaseProcessor,
    write_policy: CacheWritePolicy,
) -> Result<SaleLog, DomainError> {
    let span = info_span!(
        "purchase",
        sale_id = command.sale_id,
        correlation_id = %command.correlation_id,
    );
    let accessor = CacheAside::new(store, cache, write_policy);
    purchase(command, clock, &accessor, processor)
        .instrument(span)
        .await
}

async fn purchase(
    command: &PurchaseSale,
    clock: &dyn Clock,
    accessor: &CacheAside<'_>,
    processor: &dyn PurchaseProcessor,
) -> Result<SaleLog, DomainError> {
    let sale = accessor
        .sale(command.sale_id)
        .await?
        .ok_or_else(|| DomainError::sale_not_found(command.sale_id))?;
    let product = accessor
        .product(sale.product_id)
        .await?
        .ok_or_else(|| DomainError::product_not_found(sale.product_id))?;
    debug!(product_id = product.id, "fetched");

    let (product, sale) = match check_eligibility(&product, &sale, clock.now()) {
        Ok(()) => (product, sale),
        Err(reason) => {
            debug!(%reason, "snapshot ineligible, confirming against store");
            confirm_against_store(accessor, &product, &sale, clock).await?
        }
    };
    let price = discounted_price(product.price, sale.discount);
    debug!(%price, "eligible");

    processor.process(command, price).await?;

    let product = reconcile_product(accessor, product).await?;
    let sale = reconcile_sale(accessor, sale).await?;
    if let Err(reason) = check_eligibility(&product, &sale, clock.now()) {
        info!(%reason, "purchase rejected after reconciliation");
        return Err(DomainError::Ineligible(reason));
    }
    debug!("reconciled");

    let mut tx = accessor.store().begin_purchase().await?;
    let (rows, log) = match decrement_and_log(tx.as_mut(), product.id, sale.id, price, clock).await
    {
        Ok(done) => done,
        Err(e) => {
            if let Err(rollback_error) = tx.rollback().await {
                error!(error = %rollback_error, "rollback failed");
            }
            match &e {
                DomainError::Ineligible(reason) => {
                    info!(%reason, "purchase rejected under lock");
                }
                other => error!(error = %other, "purchase aborted"),
            }
            return Err(e);
        }
    };
    tx.commit().await.inspect_err(|e| {
        error!(error = %e, "commit failed");
    })?;
    info!(
        product_id = log.product_id,
        remaining_sale_stock = log.remaining_sale_stock,
        remaining_product_stock = log.remaining_product_stock,
        "purchase committed"
    );

    let product_refresh = accessor.refresh_product(&rows.product).await;
    let sale_refresh = accessor.refresh_sale(&rows.sale).await;
    product_refresh.and(sale_refresh)?;
    Ok(log)
}

// A cached snapshot may lag behind the store, so a rejection is only final
// once the authoritative rows agree. Rows that moved are written back to the
// cache so later requests stop seeing the old image.
async fn confirm_against_store(
    accessor: &CacheAside<'_>,
    product: &Product,
    sale: &Sale,
    clock: &dyn Clock,
) -> Result<(Product, Sale), DomainError> {
    let fresh_sale = accessor
        .fresh_sale(sale.id)
        .await?
        .ok_or_else(|| DomainError::sale_not_found(sale.id))?;
    let fresh_product = accessor
        .fresh_product(fresh_sale.product_id)
        .await?
        .ok_or_else(|| DomainError::product_not_found(fresh_sale.product_id))?;

    if fresh_sale.updated_at != sale.updated_at {
        accessor.remember_sale(&fresh_sale).await;
    }
    if fresh_product.updated_at != product.updated_at || fresh_product.id != product.id {
        accessor.remember_product(&fresh_product).await;
    }

    match check_eligibility(&fresh_product, &fresh_sale, clock.now()) {
        Ok(()) => {
            info!("stale cached snapshot overruled by store");
            Ok((fresh_product, fresh_sale))
        }
        Err(reason) => {
            info!(%reason, "purchase rejected before processing");
            Err(DomainError::Ineligible(reason))
        }
    }
}

async fn decrement_and_log(
    tx: &mut dyn PurchaseTransaction,
    product_id: i64,
    sale_id: i64,
    price: Decimal,
    clock: &dyn Clock,
) -> Result<(LockedRows, SaleLog), DomainError> {
    let locked = tx.lock_for_purchase(product_id, sale_id).await?;
    debug!("locked");
    check_eligibility(&locked.product, &locked.sale, clock.now())
        .map_err(DomainError::Ineligible)?;

    let rows = tx.decrement_stock(product_id, sale_id).await?;
    debug!("decremented");
    let log = tx
        .insert_sale_log(NewSaleLog {
            product_id,
            remaining_sale_stock: rows.sale.sale_stock,
            remaining_product_stock: rows.product.stock,
            price,
        })
        .await?;
    debug!(sale_log_id = log.id, "logged");
    Ok((rows, log))
}
