//! Invalidation run after a committed user mutation.

use std::fmt::Display;

use metrics::counter;
use tracing::error;

use super::{
    LOG_TARGET,
    keys::derive_cache_key,
    service::{CacheFlush, CacheService, CacheWrite},
};

const METRIC_CACHE_INVALIDATION: &str = "userbase_cache_invalidation_total";

/// Where an entity's cached responses live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationTargets {
    /// Namespace of single-entity responses (`users`).
    pub entity_namespace: String,
    /// Prefix of the logical entity key (`user` gives `user:{id}`).
    pub entity_key_prefix: String,
    /// Namespace of listing responses, flushed as a whole (`users:list`).
    pub list_namespace: String,
}

impl Default for InvalidationTargets {
    fn default() -> Self {
        Self {
            entity_namespace: "users".to_string(),
            entity_key_prefix: "user".to_string(),
            list_namespace: "users:list".to_string(),
        }
    }
}

impl InvalidationTargets {
    /// Logical identity of one entity, as produced by the entity route's key function.
    pub fn entity_identity(&self, id: impl Display) -> String {
        format!("{}:{}", self.entity_key_prefix, id)
    }
}

/// Drops stale entries after a write.
///
/// Failures never reach the caller. The write already committed, so the worst
/// case is stale data until the TTL expires, which is logged at `error`.
#[derive(Debug, Clone)]
pub struct CacheInvalidator {
    cache: CacheService,
    targets: InvalidationTargets,
}

impl CacheInvalidator {
    pub fn new(cache: CacheService) -> Self {
        Self::with_targets(cache, InvalidationTargets::default())
    }

    pub fn with_targets(cache: CacheService, targets: InvalidationTargets) -> Self {
        Self { cache, targets }
    }

    /// Delete the entity entry and flush every listing.
    pub async fn entity_changed(&self, id: impl Display) {
        let identity = self.targets.entity_identity(&id);
        let key = derive_cache_key(&self.targets.entity_namespace, &identity);
        counter!(METRIC_CACHE_INVALIDATION).increment(1);

        if let CacheWrite::Failed(failure) =
            self.cache.delete(&key, &self.targets.entity_namespace).await
        {
            error!(
                target: LOG_TARGET,
                entity = %identity,
                error = %failure,
                "failed to invalidate cached entity, stale reads possible until expiry"
            );
        }

        if let CacheFlush::Failed(failure) =
            self.cache.flush_namespace(&self.targets.list_namespace).await
        {
            error!(
                target: LOG_TARGET,
                entity = %identity,
                namespace = %self.targets.list_namespace,
                error = %failure,
                "failed to invalidate cached listings, stale reads possible until expiry"
            );
        }
    }
}
