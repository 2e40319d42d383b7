//! Shared test doubles for the flash sale service.

mod cache;
mod clock;
mod store;

pub use cache::FaultyCache;
pub use clock::FixedClock;
pub use store::FaultyStore;
