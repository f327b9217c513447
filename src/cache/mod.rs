//! Userbase response cache.
//!
//! Cache-aside caching of JSON read endpoints on top of an external key-value
//! store, with namespace-wide invalidation driven by mutations:
//!
//! - [`KeyValueStore`]: the store contract (Redis in production, in-process for tests)
//! - [`CacheService`]: namespaced, JSON-encoded, fail-open operations
//! - [`response_cache_layer`]: the request interception middleware
//! - [`CacheInvalidator`]: the hook the user service runs after a committed write
//!
//! Every operation here is advisory. When the store is gone the service keeps
//! answering with freshly computed data and a `X-Cache: MISS` marker.

mod config;
mod error;
mod invalidation;
mod keys;
mod memory;
mod middleware;
mod redis_store;
mod service;
mod store;

pub use config::{CacheConfig, CacheRoute, CacheRouteBuilder, KeyFn};
pub use error::CacheError;
pub use invalidation::{CacheInvalidator, InvalidationTargets};
pub use keys::{CacheEntry, derive_cache_key, etag_for, etag_matches, request_identity};
pub use memory::MemoryStore;
pub use middleware::{CacheLayerState, X_CACHE, response_cache_layer};
pub use redis_store::{RedisStore, RedisStoreOptions};
pub use service::{CacheFailure, CacheFlush, CacheLookup, CacheService, CacheWrite};
pub use store::{DisconnectedStore, KeyValueStore, StoreError};

/// Tracing target shared by every cache log line.
pub(crate) const LOG_TARGET: &str = "userbase::cache";
