//! Process-local cache backed by a concurrent hash map.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use flashsale_core::cache::Cache;
use flashsale_core::error::DomainError;
use tracing::trace;

/// A `Cache` that lives in the current process.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no key is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        trace!(key, hit = value.is_some(), "cache get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), DomainError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.entries.remove(key);
        Ok(())
    }
}
