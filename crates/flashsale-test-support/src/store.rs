//! Test store: an `InMemorySaleStore` with switchable faults.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use flashsale_core::entity::{
    NewProduct, NewSale, NewSaleLog, Product, Sale, SaleChanges, SaleLog,
};
use flashsale_core::error::DomainError;
use flashsale_core::repository::{LockedRows, PurchaseTransaction, SaleStore};
use flashsale_store::InMemorySaleStore;

#[derive(Debug, Default)]
struct Faults {
    fail_reads: AtomicBool,
    fail_sale_log_insert: AtomicBool,
    purchases_begun: AtomicUsize,
}

/// Wraps `InMemorySaleStore` and injects failures on demand.
///
/// Writes made through the admin methods are never faulted, so tests can set
/// up state and then switch a fault on.
#[derive(Debug, Clone, Default)]
pub struct FaultyStore {
    inner: InMemorySaleStore,
    faults: Arc<Faults>,
}

impl FaultyStore {
    /// Wraps a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store; bypasses every fault.
    #[must_use]
    pub fn inner(&self) -> &InMemorySaleStore {
        &self.inner
    }

    /// Makes the `find_*` and `list_*` methods fail (or recover).
    pub fn fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `insert_sale_log` fail inside purchase transactions.
    pub fn fail_sale_log_insert(&self, fail: bool) {
        self.faults.fail_sale_log_insert.store(fail, Ordering::SeqCst);
    }

    /// Number of purchase transactions opened so far.
    pub fn purchases_begun(&self) -> usize {
        self.faults.purchases_begun.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), DomainError> {
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(DomainError::Persistence("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SaleStore for FaultyStore {
    async fn find_product(&self, id: i64) -> Result<Option<Product>, DomainError> {
        self.check_read()?;
        self.inner.find_product(id).await
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, DomainError> {
        self.inner.insert_product(product).await
    }

    async fn find_sale(&self, id: i64) -> Result<Option<Sale>, DomainError> {
        self.check_read()?;
        self.inner.find_sale(id).await
    }

    async fn find_sale_by_product(&self, product_id: i64) -> Result<Option<Sale>, DomainError> {
        self.check_read()?;
        self.inner.find_sale_by_product(product_id).await
    }

    async fn list_sales(&self) -> Result<Vec<Sale>, DomainError> {
        self.check_read()?;
        self.inner.list_sales().await
    }

    async fn insert_sale(&self, sale: NewSale) -> Result<Sale, DomainError> {
        self.inner.insert_sale(sale).await
    }

    async fn update_sale(
        &self,
        id: i64,
        changes: SaleChanges,
    ) -> Result<Option<Sale>, DomainError> {
        self.inner.update_sale(id, changes).await
    }

    async fn delete_sale(&self, id: i64) -> Result<Option<Sale>, DomainError> {
        self.inner.delete_sale(id).await
    }

    async fn list_sale_logs(&self, product_id: i64) -> Result<Vec<SaleLog>, DomainError> {
        self.check_read()?;
        self.inner.list_sale_logs(product_id).await
    }

    async fn begin_purchase(&self) -> Result<Box<dyn PurchaseTransaction>, DomainError> {
        self.faults.purchases_begun.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.begin_purchase().await?;
        Ok(Box::new(FaultyPurchase {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FaultyPurchase {
    inner: Box<dyn PurchaseTransaction>,
    faults: Arc<Faults>,
}

#[async_trait]
impl PurchaseTransaction for FaultyPurchase {
    async fn lock_for_purchase(
        &mut self,
        product_id: i64,
        sale_id: i64,
    ) -> Result<LockedRows, DomainError> {
        self.inner.lock_for_purchase(product_id, sale_id).await
    }

    async fn decrement_stock(
        &mut self,
        product_id: i64,
        sale_id: i64,
    ) -> Result<LockedRows, DomainError> {
        self.inner.decrement_stock(product_id, sale_id).await
    }

    async fn insert_sale_log(&mut self, log: NewSaleLog) -> Result<SaleLog, DomainError> {
        if self.faults.fail_sale_log_insert.load(Ordering::SeqCst) {
            return Err(DomainError::Persistence("audit insert failed".into()));
        }
        self.inner.insert_sale_log(log).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.inner.rollback().await
    }
}
