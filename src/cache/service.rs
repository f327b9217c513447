//! Namespaced, fail-open cache operations.

use std::fmt;
use std::sync::Arc;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, info, warn};

use super::LOG_TARGET;
use super::error::CacheError;
use super::store::KeyValueStore;

const METRIC_CACHE_HIT: &str = "userbase_cache_hit_total";
const METRIC_CACHE_MISS: &str = "userbase_cache_miss_total";
const METRIC_CACHE_STORE_ERROR: &str = "userbase_cache_store_error_total";

/// Why a cache operation did not complete.
///
/// Never surfaced to clients; callers treat it as a miss or a skipped write.
#[derive(Debug)]
pub struct CacheFailure {
    error: CacheError,
}

impl CacheFailure {
    pub fn error(&self) -> &CacheError {
        &self.error
    }
}

impl From<CacheError> for CacheFailure {
    fn from(error: CacheError) -> Self {
        Self { error }
    }
}

impl fmt::Display for CacheFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

#[derive(Debug)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    Failed(CacheFailure),
}

#[derive(Debug)]
pub enum CacheWrite {
    Stored,
    Failed(CacheFailure),
}

impl CacheWrite {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

#[derive(Debug)]
pub enum CacheFlush {
    Flushed(u64),
    Failed(CacheFailure),
}

impl CacheFlush {
    pub fn removed(&self) -> Option<u64> {
        match self {
            Self::Flushed(count) => Some(*count),
            Self::Failed(_) => None,
        }
    }
}

/// JSON cache on top of a [`KeyValueStore`].
///
/// Entries live under `namespace:key`. No method returns an error: failures are
/// logged and reported through the outcome types.
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for CacheService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheService")
            .field("connected", &self.store.is_connected())
            .finish()
    }
}

impl CacheService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    /// Health probe. A failed ping reports `false`.
    pub async fn ping(&self) -> bool {
        match self.store.ping().await {
            Ok(alive) => alive,
            Err(err) => {
                debug!(target: LOG_TARGET, error = %err, "cache store ping failed");
                false
            }
        }
    }

    pub async fn get<T>(&self, key: &str, namespace: &str) -> CacheLookup<T>
    where
        T: DeserializeOwned,
    {
        let full_key = qualify(namespace, key);

        let bytes = match self.store.get(&full_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                counter!(METRIC_CACHE_MISS).increment(1);
                return CacheLookup::Miss;
            }
            Err(err) => {
                counter!(METRIC_CACHE_STORE_ERROR).increment(1);
                warn!(target: LOG_TARGET, key = %full_key, error = %err, "cache read failed");
                return CacheLookup::Failed(CacheError::from(err).into());
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                CacheLookup::Hit(value)
            }
            Err(err) => {
                warn!(target: LOG_TARGET, key = %full_key, error = %err, "cached entry could not be decoded");
                CacheLookup::Failed(CacheError::from(err).into())
            }
        }
    }

    pub async fn set<T>(&self, key: &str, value: &T, ttl_secs: u64, namespace: &str) -> CacheWrite
    where
        T: Serialize + ?Sized,
    {
        let full_key = qualify(namespace, key);

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(target: LOG_TARGET, key = %full_key, error = %err, "cache entry could not be encoded");
                return CacheWrite::Failed(CacheError::from(err).into());
            }
        };

        match self.store.set(&full_key, bytes, ttl_secs).await {
            Ok(()) => {
                debug!(target: LOG_TARGET, key = %full_key, ttl_secs, "cache entry stored");
                CacheWrite::Stored
            }
            Err(err) => {
                counter!(METRIC_CACHE_STORE_ERROR).increment(1);
                warn!(target: LOG_TARGET, key = %full_key, error = %err, "cache write failed");
                CacheWrite::Failed(CacheError::from(err).into())
            }
        }
    }

    pub async fn delete(&self, key: &str, namespace: &str) -> CacheWrite {
        let full_key = qualify(namespace, key);

        match self.store.delete(&full_key).await {
            Ok(()) => {
                debug!(target: LOG_TARGET, key = %full_key, "cache entry deleted");
                CacheWrite::Stored
            }
            Err(err) => {
                counter!(METRIC_CACHE_STORE_ERROR).increment(1);
                warn!(target: LOG_TARGET, key = %full_key, error = %err, "cache delete failed");
                CacheWrite::Failed(CacheError::from(err).into())
            }
        }
    }

    /// Remove every entry under `namespace`.
    pub async fn flush_namespace(&self, namespace: &str) -> CacheFlush {
        let pattern = format!("{namespace}:*");

        match self.store.delete_by_pattern(&pattern).await {
            Ok(0) => {
                debug!(target: LOG_TARGET, namespace, "cache namespace already empty");
                CacheFlush::Flushed(0)
            }
            Ok(removed) => {
                info!(target: LOG_TARGET, namespace, removed, "cache namespace flushed");
                CacheFlush::Flushed(removed)
            }
            Err(err) => {
                counter!(METRIC_CACHE_STORE_ERROR).increment(1);
                error!(target: LOG_TARGET, namespace, error = %err, "cache namespace flush failed");
                CacheFlush::Failed(CacheError::from(err).into())
            }
        }
    }
}

fn qualify(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::cache::memory::MemoryStore;
    use crate::cache::store::DisconnectedStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u32,
        name: String,
    }

    fn sample() -> Sample {
        Sample {
            id: 1,
            name: "Ada".to_string(),
        }
    }

    #[tokio::test]
    async fn set_then_get_hits_under_namespace() {
        let store = MemoryStore::new();
        let service = CacheService::new(Arc::new(store.clone()));

        assert!(service.set("abc123", &sample(), 120, "users").await.is_stored());
        assert!(store.contains("users:abc123"));

        match service.get::<Sample>("abc123", "users").await {
            CacheLookup::Hit(value) => assert_eq!(value, sample()),
            other => panic!("expected hit, got {other:?}"),
        }
        assert!(matches!(
            service.get::<Sample>("abc123", "users:list").await,
            CacheLookup::Miss
        ));
    }

    #[tokio::test]
    async fn delete_turns_hit_into_miss() {
        let service = CacheService::new(Arc::new(MemoryStore::new()));
        service.set("abc123", &sample(), 120, "users").await;

        assert!(service.delete("abc123", "users").await.is_stored());
        assert!(matches!(
            service.get::<Sample>("abc123", "users").await,
            CacheLookup::Miss
        ));
    }

    #[tokio::test]
    async fn undecodable_entry_is_reported_as_failure() {
        let store = MemoryStore::new();
        store
            .set("users:broken", b"not json".to_vec(), 60)
            .await
            .expect("raw set");
        let service = CacheService::new(Arc::new(store));

        let lookup = service.get::<Sample>("broken", "users").await;
        match lookup {
            CacheLookup::Failed(failure) => {
                assert!(matches!(failure.error(), CacheError::Serialization(_)))
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn flush_counts_only_the_namespace() {
        let store = MemoryStore::new();
        let service = CacheService::new(Arc::new(store.clone()));
        service.set("a", &sample(), 60, "users:list").await;
        service.set("b", &sample(), 60, "users:list").await;
        service.set("user:1", &sample(), 60, "users").await;

        assert_eq!(service.flush_namespace("users:list").await.removed(), Some(2));
        assert_eq!(service.flush_namespace("users:list").await.removed(), Some(0));
        assert!(store.contains("users:user:1"));
    }

    #[tokio::test]
    async fn unavailable_store_degrades_every_operation() {
        let service = CacheService::new(Arc::new(DisconnectedStore));

        let lookup = service.get::<Sample>("abc", "users").await;
        assert!(matches!(lookup, CacheLookup::Failed(_)));
        assert!(!service.set("abc", &sample(), 60, "users").await.is_stored());
        assert!(!service.delete("abc", "users").await.is_stored());
        assert_eq!(service.flush_namespace("users").await.removed(), None);
        assert!(!service.ping().await);
        assert!(!service.is_connected());
    }
}
