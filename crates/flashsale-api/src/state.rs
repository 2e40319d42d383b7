//! Shared application state.

use std::sync::Arc;

use flashsale_core::cache::Cache;
use flashsale_core::clock::Clock;
use flashsale_core::repository::SaleStore;
use flashsale_sales::application::cache_aside::CacheWritePolicy;
use flashsale_sales::application::purchase::PurchaseProcessor;

use crate::config::PurchaseSettings;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative store.
    pub store: Arc<dyn SaleStore>,
    /// Side cache in front of the store.
    pub cache: Arc<dyn Cache>,
    /// Clock used for eligibility and window checks.
    pub clock: Arc<dyn Clock>,
    /// External purchase step.
    pub processor: Arc<dyn PurchaseProcessor>,
    /// What a failed post-mutation cache refresh does to the request.
    pub cache_write_policy: CacheWritePolicy,
    /// Limits on the purchase `wait` parameter.
    pub purchase: PurchaseSettings,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn SaleStore>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
        processor: Arc<dyn PurchaseProcessor>,
        cache_write_policy: CacheWritePolicy,
        purchase: PurchaseSettings,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            processor,
            cache_write_policy,
            purchase,
        }
    }
}
