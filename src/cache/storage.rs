use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::Response;

/// Named caches, each mapping a request URL to its latest response.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every cache currently stored.
    async fn keys(&self) -> Vec<String>;
    async fn lookup(&self, cache: &str, url: &str) -> Option<Response>;
    async fn put(&self, cache: &str, url: &str, response: Response);
    /// Store every entry in one step. Readers never see a partial batch.
    async fn put_all(&self, cache: &str, entries: Vec<(String, Response)>);
    /// Drop a whole cache. Returns false if it did not exist.
    async fn delete(&self, cache: &str) -> bool;
}

/// Cache storage kept in memory. Clones share the same caches.
#[derive(Clone, Default)]
pub struct MemoryCacheStorage {
    caches: Arc<RwLock<HashMap<String, HashMap<String, Response>>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `cache`, zero if it does not exist.
    pub fn len(&self, cache: &str) -> usize {
        self.caches.read().get(cache).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.caches.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn lookup(&self, cache: &str, url: &str) -> Option<Response> {
        self.caches.read().get(cache)?.get(url).cloned()
    }

    async fn put(&self, cache: &str, url: &str, response: Response) {
        self.caches
            .write()
            .entry(cache.to_string())
            .or_default()
            .insert(url.to_string(), response);
    }

    async fn put_all(&self, cache: &str, entries: Vec<(String, Response)>) {
        let mut caches = self.caches.write();
        let target = caches.entry(cache.to_string()).or_default();
        target.extend(entries);
    }

    async fn delete(&self, cache: &str) -> bool {
        self.caches.write().remove(cache).is_some()
    }
}
