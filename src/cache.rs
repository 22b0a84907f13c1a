use std::time::Duration;

use async_trait::async_trait;

/// Key under which a user's portfolio report is cached.
pub const MY_STOCKS_KEY: &str = "my_stocks";

/// Scopes a cache key to one user.
pub fn user_key(key: &str, user_id: i64) -> String {
    format!("{}:{}", key, user_id)
}

/// A key-value store whose entries expire. Injected wherever results are
/// memoised so callers never share a process-wide singleton.
#[async_trait]
pub trait Cache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V>;

    async fn insert(&self, key: String, value: V);

    async fn remove(&self, key: &str);
}

/// Upper bound on entries held by one [`MemoryCache`].
const MAX_ENTRIES: u64 = 10_000;

/// In-process cache with a single TTL for every entry.
pub struct MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: moka::future::Cache<String, V>,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: moka::future::Cache::builder()
                .time_to_live(ttl)
                .max_capacity(MAX_ENTRIES)
                .build(),
        }
    }
}

#[async_trait]
impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).await
    }

    async fn insert(&self, key: String, value: V) {
        self.entries.insert(key, value).await;
    }

    async fn remove(&self, key: &str) {
        self.entries.invalidate(key).await;
    }
}
