//! Store abstraction.
//!
//! `SaleStore` is the authoritative record keeper. Everything a purchase
//! writes goes through a `PurchaseTransaction`, which holds exclusive row
//! locks on the product and the sale until it is committed or rolled back.

use async_trait::async_trait;

use crate::entity::{NewProduct, NewSale, NewSaleLog, Product, Sale, SaleChanges, SaleLog};
use crate::error::DomainError;

/// Product and sale rows as seen under an exclusive lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedRows {
    /// The locked product row.
    pub product: Product,
    /// The locked sale row.
    pub sale: Sale,
}

/// Repository for products, sales and the purchase audit log.
#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Looks up a product by id.
    async fn find_product(&self, id: i64) -> Result<Option<Product>, DomainError>;

    /// Inserts a product and returns it with its assigned id.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, DomainError>;

    /// Looks up a sale by id.
    async fn find_sale(&self, id: i64) -> Result<Option<Sale>, DomainError>;

    /// Looks up the sale attached to a product, if any.
    async fn find_sale_by_product(&self, product_id: i64) -> Result<Option<Sale>, DomainError>;

    /// Lists every sale ordered by id.
    async fn list_sales(&self) -> Result<Vec<Sale>, DomainError>;

    /// Inserts an inactive sale.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AlreadyExists` if the product already has a sale.
    async fn insert_sale(&self, sale: NewSale) -> Result<Sale, DomainError>;

    /// Applies `changes` to the current row and advances its version marker.
    /// Returns `None` if the sale does not exist.
    async fn update_sale(&self, id: i64, changes: SaleChanges)
    -> Result<Option<Sale>, DomainError>;

    /// Deletes a sale. Returns the deleted row, or `None` if it did not exist.
    async fn delete_sale(&self, id: i64) -> Result<Option<Sale>, DomainError>;

    /// Lists the audit entries for a product ordered by id.
    async fn list_sale_logs(&self, product_id: i64) -> Result<Vec<SaleLog>, DomainError>;

    /// Opens a purchase transaction.
    async fn begin_purchase(&self) -> Result<Box<dyn PurchaseTransaction>, DomainError>;
}

/// A unit of work covering one purchase.
///
/// Dropping a transaction without calling `commit` discards every write made
/// through it.
#[async_trait]
pub trait PurchaseTransaction: Send {
    /// Acquires exclusive locks on the product row and then the sale row.
    ///
    /// Every caller goes through this method, so the lock order is always
    /// product before sale.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if either row is missing and
    /// `DomainError::Persistence` if the lock wait times out.
    async fn lock_for_purchase(
        &mut self,
        product_id: i64,
        sale_id: i64,
    ) -> Result<LockedRows, DomainError>;

    /// Decrements both stock counters by one and returns the updated rows.
    /// Must be called after `lock_for_purchase` with the same ids.
    async fn decrement_stock(
        &mut self,
        product_id: i64,
        sale_id: i64,
    ) -> Result<LockedRows, DomainError>;

    /// Appends an audit entry.
    async fn insert_sale_log(&mut self, log: NewSaleLog) -> Result<SaleLog, DomainError>;

    /// Makes every write visible and releases the locks.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discards every write and releases the locks.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}
