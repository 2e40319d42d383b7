//! Cache backends implementing `flashsale_core::cache::Cache`.

mod memory;

pub use memory::InMemoryCache;
