//! Persistent entities: products, flash sales and the purchase audit log.
//!
//! These are the shapes held by the store and serialized into the cache, so
//! their serde representation is part of the cache contract.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog product with its own inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// List price before any discount.
    pub price: Decimal,
    /// Units on hand. Never negative.
    pub stock: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Version marker; advances on every mutation.
    pub updated_at: DateTime<Utc>,
}

/// A time-boxed discount campaign against one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    /// Sale identifier.
    pub id: i64,
    /// The product on sale.
    pub product_id: i64,
    /// Units allocated to this sale, separate from `Product::stock`.
    pub sale_stock: i32,
    /// Discount percentage in `0..=100`.
    pub discount: Decimal,
    /// Window start.
    pub start_time: DateTime<Utc>,
    /// Window end; purchases after this instant are refused.
    pub end_time: DateTime<Utc>,
    /// Purchases are refused unless set.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Version marker; advances on every mutation.
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of one successful purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLog {
    /// Log entry identifier.
    pub id: i64,
    /// The product that was bought.
    pub product_id: i64,
    /// Sale stock left after this purchase.
    pub remaining_sale_stock: i32,
    /// Product stock left after this purchase.
    pub remaining_product_stock: i32,
    /// Discounted price paid.
    pub price: Decimal,
    /// Purchase timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// List price.
    pub price: Decimal,
    /// Initial stock.
    pub stock: i32,
}

/// Fields required to insert a sale. Sales are always created inactive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    /// The product on sale.
    pub product_id: i64,
    /// Units allocated to the sale.
    pub sale_stock: i32,
    /// Discount percentage.
    pub discount: Decimal,
    /// Window start.
    pub start_time: DateTime<Utc>,
    /// Window end.
    pub end_time: DateTime<Utc>,
}

/// Partial update of a sale; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaleChanges {
    /// New discount percentage.
    pub discount: Option<Decimal>,
    /// New sale stock.
    pub sale_stock: Option<i32>,
    /// New window start.
    pub start_time: Option<DateTime<Utc>>,
    /// New window end.
    pub end_time: Option<DateTime<Utc>>,
    /// New activation flag.
    pub active: Option<bool>,
}

impl SaleChanges {
    /// Returns `sale` with these changes applied, leaving timestamps alone.
    #[must_use]
    pub fn apply_to(&self, sale: &Sale) -> Sale {
        Sale {
            discount: self.discount.unwrap_or(sale.discount),
            sale_stock: self.sale_stock.unwrap_or(sale.sale_stock),
            start_time: self.start_time.unwrap_or(sale.start_time),
            end_time: self.end_time.unwrap_or(sale.end_time),
            active: self.active.unwrap_or(sale.active),
            ..sale.clone()
        }
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Audit entry as written by the purchase transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSaleLog {
    /// The product that was bought.
    pub product_id: i64,
    /// Sale stock after the decrement.
    pub remaining_sale_stock: i32,
    /// Product stock after the decrement.
    pub remaining_product_stock: i32,
    /// Discounted price paid.
    pub price: Decimal,
}

/// Next version marker after `previous`.
///
/// Returns `now` unless that would not move forward, in which case the marker
/// is bumped by one microsecond. Two writes within the same clock tick
/// therefore never share a marker.
#[must_use]
pub fn advance_version(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
