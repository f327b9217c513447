//! Cache-aside response middleware.
//!
//! Serves `GET`/`HEAD` responses from the store when possible and writes
//! successful JSON responses back after a miss. Every failure on this path
//! degrades to running the handler.

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use tracing::{debug, error, instrument, warn};

use super::{
    CacheRoute, LOG_TARGET,
    keys::{CacheEntry, derive_cache_key, etag_for, etag_matches},
    service::{CacheLookup, CacheService},
};

/// `X-Cache: HIT | MISS` marker.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

const HIT: HeaderValue = HeaderValue::from_static("HIT");
const MISS: HeaderValue = HeaderValue::from_static("MISS");

/// State handed to [`response_cache_layer`] for one mounted route.
#[derive(Clone, Debug)]
pub struct CacheLayerState {
    pub service: CacheService,
    pub route: CacheRoute,
}

impl CacheLayerState {
    pub fn new(service: CacheService, route: CacheRoute) -> Self {
        Self { service, route }
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheLayerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Only reads are cacheable
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let Some(identity) = cache.route.identity(&parts) else {
        debug!(target: LOG_TARGET, "request has no cache identity, bypassing");
        return next.run(Request::from_parts(parts, body)).await;
    };

    // Build cache key
    let namespace = cache.route.namespace();
    let key = derive_cache_key(namespace, &identity);
    let if_none_match = parts
        .headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let request = Request::from_parts(parts, body);

    // Check cache; any failure falls through to the handler
    match cache.service.get::<CacheEntry>(&key, namespace).await {
        CacheLookup::Hit(entry) => match replay(entry, if_none_match.as_deref()) {
            Ok(response) => {
                debug!(target: LOG_TARGET, outcome = "hit", status = %response.status(), "serving cached response");
                return response;
            }
            Err(err) => {
                warn!(target: LOG_TARGET, error = %err, "cached entry could not be replayed");
            }
        },
        CacheLookup::Miss => {
            debug!(target: LOG_TARGET, outcome = "miss", "cache miss, executing handler");
        }
        CacheLookup::Failed(failure) => {
            debug!(target: LOG_TARGET, outcome = "failed", error = %failure, "cache lookup failed, executing handler");
        }
    }

    // Miss: run the handler and store what it produced
    let response = next.run(request).await;
    capture(&cache, &key, response).await
}

/// Build the response for a cache hit.
fn replay(entry: CacheEntry, if_none_match: Option<&str>) -> Result<Response, ReplayError> {
    let etag = HeaderValue::from_str(&entry.etag)?;

    if if_none_match.is_some_and(|candidates| etag_matches(candidates, &entry.etag)) {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        let headers = response.headers_mut();
        headers.insert(ETAG, etag);
        headers.insert(X_CACHE, HIT);
        return Ok(response);
    }

    let body = serde_json::to_vec(&entry.payload)?;
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ETAG, etag);
    headers.insert(X_CACHE, HIT);
    Ok(response)
}

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("stored etag is not a valid header value")]
    Etag(#[from] axum::http::header::InvalidHeaderValue),
    #[error("stored payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Buffer a fresh response and write it back to the store.
async fn capture(cache: &CacheLayerState, key: &str, response: Response) -> Response {
    if response.status() != StatusCode::OK || !is_json(response.headers()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            error!(target: LOG_TARGET, error = %err, "failed to buffer response body for caching");
            parts.headers.insert(X_CACHE, MISS);
            parts.headers.remove(CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    parts.headers.insert(X_CACHE, MISS);

    let payload = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(target: LOG_TARGET, error = %err, "response declared JSON but did not decode, not caching");
            return Response::from_parts(parts, Body::from(bytes));
        }
    };

    let etag = etag_for(&bytes);
    let entry = CacheEntry {
        etag: etag.clone(),
        payload,
    };
    let route = &cache.route;
    cache
        .service
        .set(key, &entry, route.ttl_secs(), route.namespace())
        .await;

    match HeaderValue::from_str(&etag) {
        Ok(value) => {
            parts.headers.insert(ETAG, value);
        }
        Err(err) => {
            warn!(target: LOG_TARGET, error = %err, "computed etag is not a valid header value");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
}
