//! Handlers that drive the store and the cache.

pub mod cache_aside;
pub mod command_handlers;
pub mod consistency;
pub mod purchase;
pub mod query_handlers;
