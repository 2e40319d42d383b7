//! In-process `SaleStore` with real per-row exclusive locks.
//!
//! Each product and sale row keeps its last committed image next to its own
//! `tokio::sync::Mutex`. Plain reads copy the committed image and never wait
//! on the mutex, as a plain `SELECT` does not wait on `FOR UPDATE`. A purchase
//! transaction holds owned guards on both rows and stages its writes until
//! `commit`; dropping it releases the locks with nothing applied. The
//! table-level constraints of the SQL schema are checked here too.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use flashsale_core::entity::{
    NewProduct, NewSale, NewSaleLog, Product, Sale, SaleChanges, SaleLog, advance_version,
};
use flashsale_core::error::DomainError;
use flashsale_core::repository::{LockedRows, PurchaseTransaction, SaleStore};

/// Default bound on how long a transaction waits for a row lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct RowCell<T> {
    committed: RwLock<T>,
    lock: Arc<RowLock<()>>,
}

impl<T: Clone> RowCell<T> {
    fn new(value: T) -> Row<T> {
        Arc::new(Self {
            committed: RwLock::new(value),
            lock: Arc::new(RowLock::new(())),
        })
    }

    fn snapshot(&self) -> T {
        self.committed.read().clone()
    }

    fn publish(&self, value: T) {
        *self.committed.write() = value;
    }
}

type Row<T> = Arc<RowCell<T>>;

#[derive(Debug)]
struct SaleSlot {
    product_id: i64,
    row: Row<Sale>,
}

#[derive(Debug)]
struct Tables {
    products: DashMap<i64, Row<Product>>,
    sales: DashMap<i64, SaleSlot>,
    // product id -> sale id; guards the one-sale-per-product rule.
    sales_by_product: Mutex<HashMap<i64, i64>>,
    sale_logs: Mutex<Vec<SaleLog>>,
    next_product_id: AtomicI64,
    next_sale_id: AtomicI64,
    next_sale_log_id: AtomicI64,
    lock_timeout: Duration,
}

/// In-process store.
#[derive(Debug, Clone)]
pub struct InMemorySaleStore {
    tables: Arc<Tables>,
}

impl Default for InMemorySaleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySaleStore {
    /// Creates an empty store with the default lock timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates an empty store whose transactions give up waiting for a row
    /// lock after `lock_timeout`.
    #[must_use]
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Tables {
                products: DashMap::new(),
                sales: DashMap::new(),
                sales_by_product: Mutex::new(HashMap::new()),
                sale_logs: Mutex::new(Vec::new()),
                next_product_id: AtomicI64::new(1),
                next_sale_id: AtomicI64::new(1),
                next_sale_log_id: AtomicI64::new(1),
                lock_timeout,
            }),
        }
    }

    fn product_row(&self, id: i64) -> Option<Row<Product>> {
        self.tables.products.get(&id).map(|row| Arc::clone(&row))
    }

    fn sale_row(&self, id: i64) -> Option<Row<Sale>> {
        self.tables.sales.get(&id).map(|slot| Arc::clone(&slot.row))
    }
}

fn check_sale_constraints(sale: &Sale) -> Result<(), DomainError> {
    if sale.sale_stock < 0 {
        return Err(DomainError::Validation(
            "sale stock must not be negative".into(),
        ));
    }
    if sale.discount < Decimal::ZERO || sale.discount > Decimal::ONE_HUNDRED {
        return Err(DomainError::Validation(
            "discount must be between 0 and 100".into(),
        ));
    }
    if sale.start_time >= sale.end_time {
        return Err(DomainError::Validation(
            "sale window must start before it ends".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl SaleStore for InMemorySaleStore {
    async fn find_product(&self, id: i64) -> Result<Option<Product>, DomainError> {
        let Some(row) = self.product_row(id) else {
            return Ok(None);
        };
        Ok(Some(row.snapshot()))
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, DomainError> {
        if product.stock < 0 || product.price < Decimal::ZERO {
            return Err(DomainError::Validation(
                "price and stock must not be negative".into(),
            ));
        }
        let now = Utc::now();
        let id = self.tables.next_product_id.fetch_add(1, Ordering::SeqCst);
        let product = Product {
            id,
            name: product.name,
            price: product.price.round_dp(2),
            stock: product.stock,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .products
            .insert(id, RowCell::new(product.clone()));
        Ok(product)
    }

    async fn find_sale(&self, id: i64) -> Result<Option<Sale>, DomainError> {
        let Some(row) = self.sale_row(id) else {
            return Ok(None);
        };
        Ok(Some(row.snapshot()))
    }

    async fn find_sale_by_product(&self, product_id: i64) -> Result<Option<Sale>, DomainError> {
        let sale_id = self.tables.sales_by_product.lock().get(&product_id).copied();
        match sale_id {
            Some(id) => self.find_sale(id).await,
            None => Ok(None),
        }
    }

    async fn list_sales(&self) -> Result<Vec<Sale>, DomainError> {
        let mut rows: Vec<(i64, Row<Sale>)> = self
            .tables
            .sales
            .iter()
            .map(|slot| (*slot.key(), Arc::clone(&slot.row)))
            .collect();
        rows.sort_by_key(|(id, _)| *id);

        Ok(rows.into_iter().map(|(_, row)| row.snapshot()).collect())
    }

    async fn insert_sale(&self, sale: NewSale) -> Result<Sale, DomainError> {
        if !self.tables.products.contains_key(&sale.product_id) {
            return Err(DomainError::product_not_found(sale.product_id));
        }
        let now = Utc::now();
        let mut by_product = self.tables.sales_by_product.lock();
        if by_product.contains_key(&sale.product_id) {
            return Err(DomainError::AlreadyExists(format!(
                "flash sale already exists for product {}",
                sale.product_id
            )));
        }
        let id = self.tables.next_sale_id.fetch_add(1, Ordering::SeqCst);
        let sale = Sale {
            id,
            product_id: sale.product_id,
            sale_stock: sale.sale_stock,
            discount: sale.discount,
            start_time: sale.start_time,
            end_time: sale.end_time,
            active: false,
            created_at: now,
            updated_at: now,
        };
        check_sale_constraints(&sale)?;

        by_product.insert(sale.product_id, id);
        self.tables.sales.insert(
            id,
            SaleSlot {
                product_id: sale.product_id,
                row: RowCell::new(sale.clone()),
            },
        );
        Ok(sale)
    }

    async fn update_sale(
        &self,
        id: i64,
        changes: SaleChanges,
    ) -> Result<Option<Sale>, DomainError> {
        let Some(row) = self.sale_row(id) else {
            return Ok(None);
        };
        let _guard = tokio::time::timeout(self.tables.lock_timeout, row.lock.lock())
            .await
            .map_err(|_| DomainError::Persistence("lock wait timed out".into()))?;

        let current = row.snapshot();
        let mut updated = changes.apply_to(&current);
        check_sale_constraints(&updated)?;
        updated.updated_at = advance_version(current.updated_at, Utc::now());
        row.publish(updated.clone());
        Ok(Some(updated))
    }

    async fn delete_sale(&self, id: i64) -> Result<Option<Sale>, DomainError> {
        let removed = {
            let mut by_product = self.tables.sales_by_product.lock();
            let removed = self.tables.sales.remove(&id).map(|(_, slot)| slot);
            if let Some(slot) = &removed {
                by_product.remove(&slot.product_id);
            }
            removed
        };
        match removed {
            Some(slot) => Ok(Some(slot.row.snapshot())),
            None => Ok(None),
        }
    }

    async fn list_sale_logs(&self, product_id: i64) -> Result<Vec<SaleLog>, DomainError> {
        let logs = self.tables.sale_logs.lock();
        Ok(logs
            .iter()
            .filter(|log| log.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn begin_purchase(&self) -> Result<Box<dyn PurchaseTransaction>, DomainError> {
        Ok(Box::new(InMemoryPurchase {
            store: self.clone(),
            locked: None,
            staged: None,
            staged_logs: Vec::new(),
        }))
    }
}

struct Held<T> {
    row: Row<T>,
    _guard: OwnedMutexGuard<()>,
}

struct LockedGuards {
    product: Held<Product>,
    sale: Held<Sale>,
}

/// Purchase transaction over `InMemorySaleStore`.
struct InMemoryPurchase {
    store: InMemorySaleStore,
    locked: Option<LockedGuards>,
    staged: Option<LockedRows>,
    staged_logs: Vec<SaleLog>,
}

impl InMemoryPurchase {
    async fn acquire<T>(&self, row: Row<T>) -> Result<Held<T>, DomainError> {
        let guard = tokio::time::timeout(
            self.store.tables.lock_timeout,
            Arc::clone(&row.lock).lock_owned(),
        )
        .await
        .map_err(|_| DomainError::Persistence("lock wait timed out".into()))?;
        Ok(Held { row, _guard: guard })
    }

    fn current(&self, product_id: i64, sale_id: i64) -> Result<LockedRows, DomainError> {
        let Some(locked) = &self.locked else {
            return Err(DomainError::Persistence(
                "rows must be locked before they are written".into(),
            ));
        };
        let rows = self.staged.clone().unwrap_or_else(|| LockedRows {
            product: locked.product.row.snapshot(),
            sale: locked.sale.row.snapshot(),
        });
        if rows.product.id != product_id || rows.sale.id != sale_id {
            return Err(DomainError::Persistence(
                "write targets rows this transaction has not locked".into(),
            ));
        }
        Ok(rows)
    }
}

#[async_trait]
impl PurchaseTransaction for InMemoryPurchase {
    async fn lock_for_purchase(
        &mut self,
        product_id: i64,
        sale_id: i64,
    ) -> Result<LockedRows, DomainError> {
        let product_row = self
            .store
            .product_row(product_id)
            .ok_or_else(|| DomainError::product_not_found(product_id))?;
        let product = self.acquire(product_row).await?;

        let sale_row = self
            .store
            .sale_row(sale_id)
            .ok_or_else(|| DomainError::sale_not_found(sale_id))?;
        let sale = self.acquire(sale_row).await?;

        let rows = LockedRows {
            product: product.row.snapshot(),
            sale: sale.row.snapshot(),
        };
        self.locked = Some(LockedGuards { product, sale });
        Ok(rows)
    }

    async fn decrement_stock(
        &mut self,
        product_id: i64,
        sale_id: i64,
    ) -> Result<LockedRows, DomainError> {
        let LockedRows { mut product, mut sale } = self.current(product_id, sale_id)?;
        if product.stock <= 0 || sale.sale_stock <= 0 {
            return Err(DomainError::Persistence(
                "stock check constraint violated".into(),
            ));
        }
        let now = Utc::now();
        product.stock -= 1;
        product.updated_at = advance_version(product.updated_at, now);
        sale.sale_stock -= 1;
        sale.updated_at = advance_version(sale.updated_at, now);

        let rows = LockedRows { product, sale };
        self.staged = Some(rows.clone());
        Ok(rows)
    }

    async fn insert_sale_log(&mut self, log: NewSaleLog) -> Result<SaleLog, DomainError> {
        if !self.store.tables.products.contains_key(&log.product_id) {
            return Err(DomainError::product_not_found(log.product_id));
        }
        let id = self
            .store
            .tables
            .next_sale_log_id
            .fetch_add(1, Ordering::SeqCst);
        let entry = SaleLog {
            id,
            product_id: log.product_id,
            remaining_sale_stock: log.remaining_sale_stock,
            remaining_product_stock: log.remaining_product_stock,
            price: log.price.round_dp(2),
            created_at: Utc::now(),
        };
        self.staged_logs.push(entry.clone());
        Ok(entry)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self {
            store,
            locked,
            staged,
            staged_logs,
        } = *self;

        if let (Some(guards), Some(rows)) = (locked, staged) {
            guards.product.row.publish(rows.product);
            guards.sale.row.publish(rows.sale);
            store.tables.sale_logs.lock().extend(staged_logs);
            // Guards drop here, after the audit entries are visible.
        } else if !staged_logs.is_empty() {
            store.tables.sale_logs.lock().extend(staged_logs);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}
