//! Test cache: an `InMemoryCache` whose operations can be made to fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use flashsale_cache::InMemoryCache;
use flashsale_core::cache::Cache;
use flashsale_core::error::DomainError;

/// A cache that behaves like `InMemoryCache` until told to fail.
///
/// Reads and writes fail independently, and writes can be made to fail for
/// one key prefix only. Failed calls are counted.
#[derive(Debug, Default)]
pub struct FaultyCache {
    inner: InMemoryCache,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_write_prefix: Mutex<Option<String>>,
    failures: AtomicUsize,
}

impl FaultyCache {
    /// Creates a healthy, empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache whose every operation fails.
    #[must_use]
    pub fn unavailable() -> Self {
        let cache = Self::default();
        cache.fail_reads(true);
        cache.fail_writes(true);
        cache
    }

    /// Makes `get` fail (or recover).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `set` and `delete` fail (or recover).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes `set` and `delete` fail for keys starting with `prefix` only.
    pub fn fail_writes_for(&self, prefix: &str) {
        *self.failing_write_prefix.lock() = Some(prefix.to_owned());
    }

    /// Number of calls that returned an error.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// The underlying cache, for inspecting entries directly.
    #[must_use]
    pub fn inner(&self) -> &InMemoryCache {
        &self.inner
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), DomainError> {
        if flag.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(DomainError::Cache("connection refused".into()));
        }
        Ok(())
    }

    fn check_prefix(&self, key: &str) -> Result<(), DomainError> {
        let failing = self
            .failing_write_prefix
            .lock()
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix));
        if failing {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(DomainError::Cache(format!("write to {key} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for FaultyCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        self.check(&self.fail_reads)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), DomainError> {
        self.check(&self.fail_writes)?;
        self.check_prefix(key)?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.check(&self.fail_writes)?;
        self.check_prefix(key)?;
        self.inner.delete(key).await
    }
}
