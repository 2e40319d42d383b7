//! Route modules.

pub mod flash_sales;
pub mod health;
pub mod products;
