//! Time-boxed cache for enumerated Azure resources.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::errors::AppError;

/// How long an enumerated resource set stays valid.
pub const RESOURCE_TTL_SECS: i64 = 300;

/// A cached value and when it was fetched.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub value: Arc<T>,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            fetched_at: self.fetched_at,
        }
    }
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < ttl
    }
}

/// Single-slot cache. Entries are replaced wholesale, never mutated.
///
/// The slot stays locked while a fetch runs, so concurrent readers wait for
/// that fetch instead of starting their own.
pub struct TimedCache<T> {
    name: &'static str,
    entry: Mutex<Option<CacheEntry<T>>>,
}

impl<T> TimedCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry: Mutex::new(None),
        }
    }

    /// Return the cached entry if younger than `ttl_secs`, otherwise run `fetch`
    /// and store its result. A failed fetch leaves the cache empty.
    pub async fn get_or_refresh<F, Fut>(&self, ttl_secs: i64, fetch: F) -> Result<CacheEntry<T>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut slot = self.entry.lock().await;
        if let Some(entry) = slot.as_ref() {
            if entry.is_fresh(Duration::seconds(ttl_secs), Utc::now()) {
                tracing::debug!("Cache hit: {}", self.name);
                return Ok(entry.clone());
            }
        }

        tracing::debug!("Cache miss: {}", self.name);
        *slot = None;
        let value = fetch().await?;
        let entry = CacheEntry {
            value: Arc::new(value),
            fetched_at: Utc::now(),
        };
        *slot = Some(entry.clone());
        Ok(entry)
    }

    /// Drop the cached entry so the next read refetches.
    pub async fn invalidate(&self) {
        tracing::debug!("Cache invalidated: {}", self.name);
        *self.entry.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn fetch_counting(counter: &AtomicUsize) -> Result<Vec<String>, AppError> {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(vec![format!("fetch-{}", n)])
    }

    #[tokio::test]
    async fn test_value_reused_within_ttl() {
        let cache = TimedCache::new("containers");
        let counter = AtomicUsize::new(0);

        let first = cache
            .get_or_refresh(RESOURCE_TTL_SECS, || fetch_counting(&counter))
            .await
            .unwrap();
        let second = cache
            .get_or_refresh(RESOURCE_TTL_SECS, || fetch_counting(&counter))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(first.value, second.value);
        assert_eq!(first.fetched_at, second.fetched_at);
    }

    #[tokio::test]
    async fn test_expired_entry_refetched() {
        let cache = TimedCache::new("dashboards");
        let counter = AtomicUsize::new(0);

        cache.get_or_refresh(0, || fetch_counting(&counter)).await.unwrap();
        let entry = cache.get_or_refresh(0, || fetch_counting(&counter)).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(entry.value.as_slice(), ["fetch-2".to_string()]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = TimedCache::new("containers");
        let counter = AtomicUsize::new(0);

        cache
            .get_or_refresh(RESOURCE_TTL_SECS, || fetch_counting(&counter))
            .await
            .unwrap();
        cache.invalidate().await;
        cache
            .get_or_refresh(RESOURCE_TTL_SECS, || fetch_counting(&counter))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_not_stored() {
        let cache: TimedCache<Vec<String>> = TimedCache::new("containers");
        let counter = AtomicUsize::new(0);

        let err = cache
            .get_or_refresh(RESOURCE_TTL_SECS, || async {
                Err(AppError::Upstream("storage unreachable".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_ERROR");

        let entry = cache
            .get_or_refresh(RESOURCE_TTL_SECS, || fetch_counting(&counter))
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(entry.value.len(), 1);
    }
}
