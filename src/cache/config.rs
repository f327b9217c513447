//! Cache configuration.
//!
//! Global TTLs come from the `cache` settings section; each cached route gets
//! its own [`CacheRoute`] built at router construction time.

use std::fmt;
use std::sync::Arc;

use axum::http::request::Parts;

use super::error::CacheError;
use super::keys::request_identity;

const DEFAULT_ENTITY_TTL_SECS: u64 = 300;
const DEFAULT_LIST_TTL_SECS: u64 = 120;
const DEFAULT_ROUTE_TTL_SECS: u64 = 60;
const DEFAULT_ROUTE_NAMESPACE: &str = "http";

/// TTLs applied to the user routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL of single-entity responses.
    pub default_ttl_seconds: u64,
    /// TTL of listing responses.
    pub list_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: DEFAULT_ENTITY_TTL_SECS,
            list_ttl_seconds: DEFAULT_LIST_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            default_ttl_seconds: settings.default_ttl_seconds.get(),
            list_ttl_seconds: settings.list_ttl_seconds.get(),
        }
    }
}

/// Derives the logical identity of a request. `None` bypasses the cache.
pub type KeyFn = Arc<dyn Fn(&Parts) -> Option<String> + Send + Sync>;

/// Cache policy for one mounted route.
#[derive(Clone)]
pub struct CacheRoute {
    namespace: String,
    ttl_secs: u64,
    key_fn: Option<KeyFn>,
}

impl fmt::Debug for CacheRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRoute")
            .field("namespace", &self.namespace)
            .field("ttl_secs", &self.ttl_secs)
            .field("custom_key", &self.key_fn.is_some())
            .finish()
    }
}

impl CacheRoute {
    pub fn builder() -> CacheRouteBuilder {
        CacheRouteBuilder::default()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Logical identity for `parts`: the custom key function when one is set,
    /// otherwise path plus query.
    pub fn identity(&self, parts: &Parts) -> Option<String> {
        match &self.key_fn {
            Some(key_fn) => key_fn(parts),
            None => Some(request_identity(&parts.uri)),
        }
    }
}

#[derive(Clone)]
pub struct CacheRouteBuilder {
    namespace: String,
    ttl_secs: u64,
    key_fn: Option<KeyFn>,
}

impl Default for CacheRouteBuilder {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_ROUTE_NAMESPACE.to_string(),
            ttl_secs: DEFAULT_ROUTE_TTL_SECS,
            key_fn: None,
        }
    }
}

impl CacheRouteBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Parts) -> Option<String> + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    pub fn build(self) -> Result<CacheRoute, CacheError> {
        let namespace = self.namespace.trim();
        if namespace.is_empty() {
            return Err(CacheError::configuration("cache namespace must not be empty"));
        }
        if namespace.contains(['*', '?', '[']) {
            return Err(CacheError::configuration(format!(
                "cache namespace `{namespace}` must not contain glob characters"
            )));
        }
        if self.ttl_secs == 0 {
            return Err(CacheError::configuration(format!(
                "cache TTL for namespace `{namespace}` must be greater than zero"
            )));
        }

        Ok(CacheRoute {
            namespace: namespace.to_string(),
            ttl_secs: self.ttl_secs,
            key_fn: self.key_fn,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .uri(uri)
            .body(())
            .expect("request")
            .into_parts();
        parts
    }

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl_seconds, 300);
        assert_eq!(config.list_ttl_seconds, 120);

        let route = CacheRoute::builder().build().expect("defaults are valid");
        assert_eq!(route.namespace(), "http");
        assert_eq!(route.ttl_secs(), 60);
    }

    #[test]
    fn empty_namespace_is_rejected() {
        let err = CacheRoute::builder()
            .namespace("  ")
            .build()
            .expect_err("empty namespace");
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn glob_namespace_is_rejected() {
        let err = CacheRoute::builder()
            .namespace("users:*")
            .build()
            .expect_err("glob namespace");
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = CacheRoute::builder()
            .namespace("users")
            .ttl_secs(0)
            .build()
            .expect_err("zero ttl");
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn identity_defaults_to_path_and_query() {
        let route = CacheRoute::builder()
            .namespace("users:list")
            .build()
            .expect("route");
        assert_eq!(
            route.identity(&parts("/api/v1/users?page=2")).as_deref(),
            Some("/api/v1/users?page=2")
        );
    }

    #[test]
    fn custom_key_fn_overrides_identity() {
        let route = CacheRoute::builder()
            .namespace("users")
            .key_fn(|parts| {
                parts
                    .uri
                    .path()
                    .rsplit('/')
                    .next()
                    .map(|id| format!("user:{id}"))
            })
            .build()
            .expect("route");
        assert_eq!(
            route.identity(&parts("/api/v1/users/42")).as_deref(),
            Some("user:42")
        );
    }
}
