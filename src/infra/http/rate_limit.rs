use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use metrics::counter;
use tracing::warn;

use super::error::ApiError;
use super::state::ApiState;

const METRIC_RATE_LIMITED: &str = "userbase_rate_limited_total";
const UNKNOWN_CLIENT: &str = "unknown";

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the oldest request in the window expires.
    pub reset_after_secs: u64,
}

/// Sliding-window limiter keyed by client identity.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let decision = self.admit(key, now);
        self.sweep_expired(now);
        decision
    }

    fn admit(&self, key: &str, now: Instant) -> RateDecision {
        let window = self.window;

        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let used = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        if used >= self.max_requests {
            return RateDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_after_secs: self.reset_after(entry.first(), now),
            };
        }

        entry.push(now);
        RateDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - used - 1,
            reset_after_secs: self.reset_after(entry.first(), now),
        }
    }

    /// Drop clients with no request left in the window, at most once per window.
    /// Must run with no bucket guard held.
    fn sweep_expired(&self, now: Instant) {
        {
            let Ok(mut last) = self.last_sweep.try_lock() else {
                return;
            };
            if now.duration_since(*last) < self.window {
                return;
            }
            *last = now;
        }

        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
    }

    fn reset_after(&self, oldest: Option<&Instant>, now: Instant) -> u64 {
        let left = match oldest {
            Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
            None => self.window,
        };
        // round up; a client told 0 would retry immediately
        (left.as_secs() + u64::from(left.subsec_nanos() > 0)).max(1)
    }
}

/// Admission control for `/api/*`.
pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&request, state.options.trust_proxy);
    let decision = state.rate_limiter.check(&client);

    if !decision.allowed {
        counter!(METRIC_RATE_LIMITED).increment(1);
        warn!(
            target = "userbase::http::rate_limit",
            client = %client,
            path = %request.uri().path(),
            retry_after = decision.reset_after_secs,
            "rate limit exceeded"
        );
        let mut response = ApiError::rate_limited(decision.reset_after_secs).into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

/// First `X-Forwarded-For` hop behind a trusted proxy, else the peer address.
pub fn client_key(request: &Request<Body>, trust_proxy: bool) -> String {
    if trust_proxy
        && let Some(forwarded) = forwarded_client(request.headers())
    {
        return forwarded;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_after_secs));
}
