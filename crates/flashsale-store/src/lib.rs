//! Flash Sale Store: authoritative persistence backends.
//!
//! `PgSaleStore` is the production backend; `InMemorySaleStore` keeps the
//! same locking semantics in-process for tests and the demo mode.

pub mod memory;
pub mod pg_sale_store;
pub mod schema;

pub use memory::InMemorySaleStore;
pub use pg_sale_store::PgSaleStore;
