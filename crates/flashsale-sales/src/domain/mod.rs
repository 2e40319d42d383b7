//! Commands and pure purchase rules.

pub mod commands;
pub mod eligibility;
