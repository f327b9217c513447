//! In-process key-value store.
//!
//! Mirrors the subset of Redis semantics the cache relies on (TTL expiry and
//! glob pattern deletion). Used by tests and local runs without Redis.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::store::{KeyValueStore, StoreError};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// `DashMap`-backed store with store-enforced expiry.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
    connected: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate the connection dropping (`false`) or coming back (`true`).
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry exists under the fully qualified `key`.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| entry.value().is_live(now))
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_connected()?;
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, StoreError> {
        self.ensure_connected()?;
        let now = Instant::now();

        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_live(now) && glob_matches(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0u64;
        for key in matching {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<bool, StoreError> {
        self.ensure_connected()?;
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Redis-style glob matching limited to `*` and `?`.
fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let (mut p, mut c) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, c));
                p += 1;
            }
            Some('?') => {
                p += 1;
                c += 1;
            }
            Some(ch) if *ch == candidate[c] => {
                p += 1;
                c += 1;
            }
            _ => match backtrack {
                Some((star_p, star_c)) => {
                    p = star_p + 1;
                    c = star_c + 1;
                    backtrack = Some((star_p, star_c + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|ch| *ch == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_namespace_patterns() {
        assert!(glob_matches("users:list:*", "users:list:abc"));
        assert!(glob_matches("users:list:*", "users:list:"));
        assert!(!glob_matches("users:list:*", "users:user:1"));
        assert!(!glob_matches("users:list:*", "users:lis"));
        assert!(glob_matches("users:*", "users:list:abc"));
        assert!(glob_matches("u?ers:*", "users:x"));
        assert!(glob_matches("*:user:*", "users:user:1"));
        assert!(!glob_matches("users", "users:x"));
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .set("users:abc123", b"{\"etag\":\"e1\"}".to_vec(), 120)
            .await
            .expect("set should succeed");

        let value = store.get("users:abc123").await.expect("get should succeed");
        assert_eq!(value.as_deref(), Some(&b"{\"etag\":\"e1\"}"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set("users:abc123", b"1".to_vec(), 120)
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(store.get("users:abc123").await.expect("get").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("users:abc123").await.expect("get").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_by_pattern_counts_removed_keys() {
        let store = MemoryStore::new();
        for key in ["users:list:a", "users:list:b", "users:user:1"] {
            store.set(key, b"1".to_vec(), 60).await.expect("set");
        }

        let removed = store
            .delete_by_pattern("users:list:*")
            .await
            .expect("pattern delete");
        assert_eq!(removed, 2);
        assert!(store.contains("users:user:1"));
        assert_eq!(store.len(), 1);

        let removed = store
            .delete_by_pattern("users:list:*")
            .await
            .expect("pattern delete");
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn disconnected_store_fails_fast() {
        let store = MemoryStore::new();
        store.set("k", b"v".to_vec(), 60).await.expect("set");
        store.set_connected(false);

        assert!(!store.is_connected());
        assert_eq!(store.get("k").await, Err(StoreError::Unavailable));
        assert_eq!(store.ping().await, Err(StoreError::Unavailable));

        store.set_connected(true);
        assert!(store.get("k").await.expect("get").is_some());
    }
}
