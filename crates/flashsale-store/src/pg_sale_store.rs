//! `PostgreSQL` implementation of the `SaleStore` trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use flashsale_core::entity::{
    NewProduct, NewSale, NewSaleLog, Product, Sale, SaleChanges, SaleLog,
};
use flashsale_core::error::DomainError;
use flashsale_core::repository::{LockedRows, PurchaseTransaction, SaleStore};

use crate::schema::{
    ADVANCE_VERSION, LOCK_NOT_AVAILABLE, PRODUCT_COLUMNS, SALE_COLUMNS, SALE_LOG_COLUMNS,
};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: Decimal,
    stock: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: i64,
    product_id: i64,
    sale_stock: i32,
    discount: Decimal,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            sale_stock: row.sale_stock,
            discount: row.discount,
            start_time: row.start_time,
            end_time: row.end_time,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleLogRow {
    id: i64,
    product_id: i64,
    remaining_sale_stock: i32,
    remaining_product_stock: i32,
    price: Decimal,
    created_at: DateTime<Utc>,
}

impl From<SaleLogRow> for SaleLog {
    fn from(row: SaleLogRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            remaining_sale_stock: row.remaining_sale_stock,
            remaining_product_stock: row.remaining_product_stock,
            price: row.price,
            created_at: row.created_at,
        }
    }
}

fn persistence(err: &sqlx::Error) -> DomainError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            return DomainError::Persistence("lock wait timed out".into());
        }
    }
    DomainError::Persistence(err.to_string())
}

/// Maps constraint violations on the `sales` table to domain errors.
fn sale_write_error(err: &sqlx::Error, product_id: Option<i64>) -> DomainError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let product = product_id.map_or_else(String::new, |id| format!(" {id}"));
            return DomainError::AlreadyExists(format!(
                "flash sale already exists for product{product}"
            ));
        }
        if db_err.is_check_violation() {
            return DomainError::Validation(db_err.message().to_owned());
        }
        if db_err.is_foreign_key_violation() {
            if let Some(id) = product_id {
                return DomainError::product_not_found(id);
            }
        }
    }
    persistence(err)
}

/// Smallest lock wait `PgSaleStore` will configure.
pub const MIN_LOCK_TIMEOUT: Duration = Duration::from_millis(1);

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgSaleStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgSaleStore {
    /// Creates a new `PgSaleStore`. Purchase transactions wait at most
    /// `lock_timeout` for a row lock. A zero timeout is raised to one
    /// millisecond, since PostgreSQL reads `0` as no limit.
    #[must_use]
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool,
            lock_timeout: lock_timeout.max(MIN_LOCK_TIMEOUT),
        }
    }

    /// Lock wait applied to purchase transactions.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }
}

#[async_trait]
impl SaleStore for PgSaleStore {
    async fn find_product(&self, id: i64) -> Result<Option<Product>, DomainError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| persistence(&e))?;
        Ok(row.map(Product::from))
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, DomainError> {
        let sql = format!(
            "INSERT INTO products (name, price, stock) VALUES ($1, $2, $3) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(product.price)
            .bind(product.stock)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db_err) if db_err.is_check_violation() => {
                    DomainError::Validation(db_err.message().to_owned())
                }
                _ => persistence(&e),
            })?;
        Ok(row.into())
    }

    async fn find_sale(&self, id: i64) -> Result<Option<Sale>, DomainError> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| persistence(&e))?;
        Ok(row.map(Sale::from))
    }

    async fn find_sale_by_product(&self, product_id: i64) -> Result<Option<Sale>, DomainError> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE product_id = $1");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| persistence(&e))?;
        Ok(row.map(Sale::from))
    }

    async fn list_sales(&self) -> Result<Vec<Sale>, DomainError> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales ORDER BY id");
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| persistence(&e))?;
        Ok(rows.into_iter().map(Sale::from).collect())
    }

    async fn insert_sale(&self, sale: NewSale) -> Result<Sale, DomainError> {
        let sql = format!(
            "INSERT INTO sales (product_id, sale_stock, discount, start_time, end_time, active) \
             VALUES ($1, $2, $3, $4, $5, FALSE) \
             RETURNING {SALE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(sale.product_id)
            .bind(sale.sale_stock)
            .bind(sale.discount)
            .bind(sale.start_time)
            .bind(sale.end_time)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| sale_write_error(&e, Some(sale.product_id)))?;
        Ok(row.into())
    }

    async fn update_sale(
        &self,
        id: i64,
        changes: SaleChanges,
    ) -> Result<Option<Sale>, DomainError> {
        let sql = format!(
            "UPDATE sales SET \
                 discount = COALESCE($2, discount), \
                 sale_stock = COALESCE($3, sale_stock), \
                 start_time = COALESCE($4, start_time), \
                 end_time = COALESCE($5, end_time), \
                 active = COALESCE($6, active), \
                 updated_at = {ADVANCE_VERSION} \
             WHERE id = $1 \
             RETURNING {SALE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .bind(changes.discount)
            .bind(changes.sale_stock)
            .bind(changes.start_time)
            .bind(changes.end_time)
            .bind(changes.active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| sale_write_error(&e, None))?;
        Ok(row.map(Sale::from))
    }

    async fn delete_sale(&self, id: i64) -> Result<Option<Sale>, DomainError> {
        let sql = format!("DELETE FROM sales WHERE id = $1 RETURNING {SALE_COLUMNS}");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| persistence(&e))?;
        Ok(row.map(Sale::from))
    }

    async fn list_sale_logs(&self, product_id: i64) -> Result<Vec<SaleLog>, DomainError> {
        let sql =
            format!("SELECT {SALE_LOG_COLUMNS} FROM sale_logs WHERE product_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, SaleLogRow>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| persistence(&e))?;
        Ok(rows.into_iter().map(SaleLog::from).collect())
    }

    async fn begin_purchase(&self) -> Result<Box<dyn PurchaseTransaction>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| persistence(&e))?;

        // set_config(..., true) scopes the setting to this transaction.
        let timeout_ms = self.lock_timeout.as_millis().to_string();
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{timeout_ms}ms"))
            .execute(&mut *tx)
            .await
            .map_err(|e| persistence(&e))?;

        Ok(Box::new(PgPurchase { tx }))
    }
}

/// Purchase transaction over a pooled PostgreSQL connection. sqlx rolls the
/// transaction back if it is dropped uncommitted.
struct PgPurchase {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PurchaseTransaction for PgPurchase {
    async fn lock_for_purchase(
        &mut self,
        product_id: i64,
        sale_id: i64,
    ) -> Result<LockedRows, DomainError> {
        let product_sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let product = sqlx::query_as::<_, ProductRow>(&product_sql)
            .bind(product_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| persistence(&e))?
            .ok_or_else(|| DomainError::product_not_found(product_id))?;

        let sale_sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1 FOR UPDATE");
        let sale = sqlx::query_as::<_, SaleRow>(&sale_sql)
            .bind(sale_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| persistence(&e))?
            .ok_or_else(|| DomainError::sale_not_found(sale_id))?;

        debug!(product_id, sale_id, "locked product and sale rows");
        Ok(LockedRows {
            product: product.into(),
            sale: sale.into(),
        })
    }

    async fn decrement_stock(
        &mut self,
        product_id: i64,
        sale_id: i64,
    ) -> Result<LockedRows, DomainError> {
        let product_sql = format!(
            "UPDATE products SET stock = stock - 1, updated_at = {ADVANCE_VERSION} \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let product = sqlx::query_as::<_, ProductRow>(&product_sql)
            .bind(product_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| persistence(&e))?
            .ok_or_else(|| DomainError::product_not_found(product_id))?;

        let sale_sql = format!(
            "UPDATE sales SET sale_stock = sale_stock - 1, updated_at = {ADVANCE_VERSION} \
             WHERE id = $1 RETURNING {SALE_COLUMNS}"
        );
        let sale = sqlx::query_as::<_, SaleRow>(&sale_sql)
            .bind(sale_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| persistence(&e))?
            .ok_or_else(|| DomainError::sale_not_found(sale_id))?;

        Ok(LockedRows {
            product: product.into(),
            sale: sale.into(),
        })
    }

    async fn insert_sale_log(&mut self, log: NewSaleLog) -> Result<SaleLog, DomainError> {
        let sql = format!(
            "INSERT INTO sale_logs (product_id, remaining_sale_stock, remaining_product_stock, price) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {SALE_LOG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SaleLogRow>(&sql)
            .bind(log.product_id)
            .bind(log.remaining_sale_stock)
            .bind(log.remaining_product_stock)
            .bind(log.price)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| persistence(&e))?;
        Ok(row.into())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self { tx } = *self;
        tx.commit().await.map_err(|e| persistence(&e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        let Self { tx } = *self;
        tx.rollback().await.map_err(|e| persistence(&e))
    }
}
