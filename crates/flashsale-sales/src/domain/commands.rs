//! Commands for the flash sale context.

use std::time::Duration;

use chrono::{DateTime, Utc};
use flashsale_core::command::Command;
use flashsale_core::entity::SaleChanges;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Command to buy one unit through a flash sale.
#[derive(Debug, Clone)]
pub struct PurchaseSale {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The sale to buy from.
    pub sale_id: i64,
    /// Time spent in the external processing step.
    pub processing_delay: Duration,
}

impl Command for PurchaseSale {
    fn command_type(&self) -> &'static str {
        "sales.purchase"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to open a flash sale on a product.
#[derive(Debug, Clone)]
pub struct CreateSale {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The product to put on sale.
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

impl Command for CreateSale {
    fn command_type(&self) -> &'static str {
        "sales.create_sale"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to change some fields of a sale.
#[derive(Debug, Clone)]
pub struct UpdateSale {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The sale identifier.
    pub sale_id: i64,
    /// Fields to change.
    pub changes: SaleChanges,
}

impl Command for UpdateSale {
    fn command_type(&self) -> &'static str {
        "sales.update_sale"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove a sale.
#[derive(Debug, Clone)]
pub struct DeleteSale {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The sale identifier.
    pub sale_id: i64,
}

impl Command for DeleteSale {
    fn command_type(&self) -> &'static str {
        "sales.delete_sale"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to register a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Display name.
    pub name: String,
    /// List price.
    pub price: Decimal,
    /// Initial stock.
    pub stock: i32,
}

impl Command for CreateProduct {
    fn command_type(&self) -> &'static str {
        "sales.create_product"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
