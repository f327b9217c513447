//! Cache key derivation and entity tags.

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stored representation of a cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub etag: String,
    pub payload: serde_json::Value,
}

/// Hex SHA-256 of `namespace:identity`.
///
/// The namespace takes part in the digest, so equal identities under different
/// namespaces never share a key.
pub fn derive_cache_key(namespace: &str, identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(identity.as_bytes());
    hex::encode(hasher.finalize().to_vec())
}

/// Default request identity: the path, plus `?query` when one is present.
pub fn request_identity(uri: &Uri) -> String {
    match uri.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", uri.path(), query),
        _ => uri.path().to_string(),
    }
}

/// Strong entity tag for a serialized body.
pub fn etag_for(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("\"{}\"", hex::encode(hasher.finalize().to_vec()))
}

/// Evaluate an `If-None-Match` header value against the stored tag.
///
/// Weak comparison: `W/` prefixes are ignored, `*` matches anything, and a
/// comma separated list matches when any member does.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let stored = normalize_tag(etag);
    if_none_match
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .any(|candidate| candidate == "*" || normalize_tag(candidate) == stored)
}

fn normalize_tag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"')
}
