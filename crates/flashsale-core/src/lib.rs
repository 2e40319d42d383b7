//! Flash Sale Core: shared domain abstractions.
//!
//! This crate defines the entities, error taxonomy and storage seams that the
//! application and infrastructure crates depend on. It contains no
//! infrastructure code.

pub mod cache;
pub mod clock;
pub mod command;
pub mod entity;
pub mod error;
pub mod repository;
