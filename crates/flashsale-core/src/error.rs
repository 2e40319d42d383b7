//! Domain error types.

use std::fmt;

use thiserror::Error;

/// Why a purchase was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    /// The sale has not been activated (or was deactivated).
    Inactive,
    /// The product's own stock is exhausted.
    ProductOutOfStock,
    /// The sale's stock pool is exhausted.
    SaleStockExhausted,
    /// The sale window has closed.
    Ended,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Inactive => "sale is not active",
            Self::ProductOutOfStock => "product is out of stock",
            Self::SaleStockExhausted => "sale stock is exhausted",
            Self::Ended => "sale period has ended",
        };
        f.write_str(reason)
    }
}

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced product or sale does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"sale"`.
        entity: &'static str,
        /// The identifier that was looked up.
        id: i64,
    },

    /// Malformed request fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// The purchase cannot go ahead.
    #[error("purchase failed: {0}")]
    Ineligible(Ineligibility),

    /// A sale already exists for the product.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Store transaction, lock acquisition or insert failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Cache refresh after a committed mutation failed.
    #[error("cache error: {0}")]
    Cache(String),
}

impl DomainError {
    /// Shorthand for a missing product.
    #[must_use]
    pub fn product_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "product",
            id,
        }
    }

    /// Shorthand for a missing sale.
    #[must_use]
    pub fn sale_not_found(id: i64) -> Self {
        Self::NotFound { entity: "sale", id }
    }
}
