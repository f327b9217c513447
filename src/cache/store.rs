//! Key-value store contract consumed by the cache service.

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a store adapter.
///
/// Callers on read paths treat every variant as a cache miss.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("key-value store is not connected")]
    Unavailable,
    #[error("key-value store did not answer in time")]
    Timeout,
    #[error("key-value store command failed: {0}")]
    Command(String),
}

impl StoreError {
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }
}

/// Thin contract over a networked cache.
///
/// Keys are fully qualified (`namespace:key`); namespacing is the cache
/// service's concern, not the adapter's.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch raw bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, expiring after `ttl_secs` seconds.
    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<(), StoreError>;

    /// Remove a single key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every key matching a glob `pattern` and return how many were removed.
    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, StoreError>;

    /// Round-trip check against the store.
    async fn ping(&self) -> Result<bool, StoreError>;

    /// Whether the underlying connection is currently established.
    fn is_connected(&self) -> bool;
}

/// Store used when no cache backend is configured.
///
/// Every operation reports [`StoreError::Unavailable`], so the service runs
/// with a permanent cache miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedStore;

#[async_trait]
impl KeyValueStore for DisconnectedStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl_secs: u64) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn delete_by_pattern(&self, _pattern: &str) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn ping(&self) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn is_connected(&self) -> bool {
        false
    }
}
