//! In-memory recency cache for open tenant indexes.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;

use super::index::TenantIndex;

/// Cache of open tenant indexes, bounded by capacity.
pub type IndexCache = RecencyCache<TenantIndex>;

/// Keeps the most recently used values, keyed by tenant. Touching an entry on
/// hit marks it most recent; inserting past capacity evicts the least
/// recently used value, which drops it (for an index, closing its
/// connection).
pub struct RecencyCache<V> {
    inner: Mutex<LruCache<String, Arc<V>>>,
}

impl<V> RecencyCache<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a tenant's value, promoting it to most recently used.
    pub async fn get(&self, tenant: &str) -> Option<Arc<V>> {
        let mut cache = self.inner.lock().await;
        cache.get(tenant).cloned()
    }

    /// Insert or replace a tenant's value as the most recently used entry.
    pub async fn put(&self, tenant: &str, value: Arc<V>) {
        let mut cache = self.inner.lock().await;
        cache.put(tenant.to_string(), value);
    }

    /// Drop a tenant's entry, if present. Used when an index is rebuilt so a
    /// stale handle cannot be served.
    pub async fn invalidate(&self, tenant: &str) {
        let mut cache = self.inner.lock().await;
        cache.pop(tenant);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Cached tenants, most recently used first.
    pub async fn tenants(&self) -> Vec<String> {
        let cache = self.inner.lock().await;
        cache.iter().map(|(k, _)| k.clone()).collect()
    }
}
