//! Flash sale application layer.
//!
//! Responsible for the purchase protocol (eligibility, staleness
//! reconciliation, locked decrement, audit write, cache refresh) and the
//! administrative flows around sales and products.

pub mod application;
pub mod domain;
