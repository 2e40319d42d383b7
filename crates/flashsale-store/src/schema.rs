//! SQL fragments shared by the PostgreSQL store.
//!
//! The tables themselves are created by the workspace migrations.

/// Columns selected for a product row.
pub const PRODUCT_COLUMNS: &str = "id, name, price, stock, created_at, updated_at";

/// Columns selected for a sale row.
pub const SALE_COLUMNS: &str =
    "id, product_id, sale_stock, discount, start_time, end_time, active, created_at, updated_at";

/// Columns selected for an audit row.
pub const SALE_LOG_COLUMNS: &str =
    "id, product_id, remaining_sale_stock, remaining_product_stock, price, created_at";

/// Next version marker for the row being updated. `clock_timestamp()` is used
/// rather than `NOW()` because the latter is frozen at transaction start.
pub const ADVANCE_VERSION: &str = "GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond')";

/// SQLSTATE raised when `lock_timeout` expires.
pub const LOCK_NOT_AVAILABLE: &str = "55P03";
