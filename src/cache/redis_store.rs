//! Redis-backed key-value store.
//!
//! Reconnection and command timeouts are delegated to the `redis` crate's
//! `ConnectionManager`; this adapter only translates errors and tracks
//! whether the last round-trip succeeded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::LOG_TARGET;
use super::store::{KeyValueStore, StoreError};

const SCAN_BATCH: usize = 200;

/// Connection parameters for [`RedisStore::connect`].
#[derive(Debug, Clone)]
pub struct RedisStoreOptions {
    pub url: String,
    pub response_timeout: Duration,
    pub connection_timeout: Duration,
}

/// Key-value store backed by a multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    manager: Arc<RwLock<Option<ConnectionManager>>>,
    connected: Arc<AtomicBool>,
}

impl RedisStore {
    /// Open the connection and verify it with a `PING`.
    pub async fn connect(options: &RedisStoreOptions) -> Result<Self, StoreError> {
        let client = Client::open(options.url.as_str()).map_err(map_redis_error)?;
        let config = ConnectionManagerConfig::new()
            .set_response_timeout(options.response_timeout)
            .set_connection_timeout(options.connection_timeout);

        let manager = ConnectionManager::new_with_config(client, config)
            .await
            .map_err(map_redis_error)?;

        let store = Self {
            manager: Arc::new(RwLock::new(Some(manager))),
            connected: Arc::new(AtomicBool::new(true)),
        };

        store.ping().await?;
        info!(target: LOG_TARGET, "redis connection established");
        Ok(store)
    }

    /// Drop the connection. Subsequent operations report `Unavailable`.
    pub async fn close(&self) {
        let previous = self.manager.write().await.take();
        self.connected.store(false, Ordering::SeqCst);
        if previous.is_some() {
            info!(target: LOG_TARGET, "redis connection closed");
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.manager
            .read()
            .await
            .clone()
            .ok_or(StoreError::Unavailable)
    }

    fn observe<T>(&self, result: Result<T, RedisError>) -> Result<T, StoreError> {
        match result {
            Ok(value) => {
                self.connected.store(true, Ordering::SeqCst);
                Ok(value)
            }
            Err(err) => {
                let mapped = map_redis_error(err);
                if matches!(mapped, StoreError::Unavailable) {
                    self.connected.store(false, Ordering::SeqCst);
                }
                Err(mapped)
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection().await?;
        let result: Result<Option<Vec<u8>>, RedisError> = conn.get(key).await;
        self.observe(result)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result: Result<(), RedisError> = conn.set_ex(key, value, ttl_secs).await;
        self.observe(result)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result: Result<(), RedisError> = conn.del(key).await;
        self.observe(result)
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;

        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let result: Result<(u64, Vec<String>), RedisError> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await;
            let (next, batch) = self.observe(result)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        if keys.is_empty() {
            return Ok(0);
        }

        keys.sort_unstable();
        keys.dedup();
        debug!(target: LOG_TARGET, pattern, matched = keys.len(), "deleting keys by pattern");

        let result: Result<u64, RedisError> = conn.del(keys.as_slice()).await;
        self.observe(result)
    }

    async fn ping(&self) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let result: Result<String, RedisError> =
            redis::cmd("PING").query_async(&mut conn).await;
        let pong = self.observe(result)?;
        Ok(pong.eq_ignore_ascii_case("PONG"))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
        warn!(target: LOG_TARGET, error = %err, "redis connection unavailable");
        StoreError::Unavailable
    } else {
        StoreError::command(err.to_string())
    }
}
