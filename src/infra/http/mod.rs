//! HTTP surface: routing, envelopes, admission control and response caching.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod validation;

pub use error::ApiError;
pub use rate_limit::ApiRateLimiter;
pub use state::{ApiState, HttpOptions};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::request::Parts,
    middleware::{from_fn, from_fn_with_state},
    routing::{MethodRouter, get},
};
use uuid::Uuid;

use crate::cache::{
    CacheError, CacheLayerState, CacheRoute, InvalidationTargets, response_cache_layer,
};

use self::middleware::{log_responses, set_request_context};

/// Assemble the application router.
///
/// Fails only when a cache route is misconfigured.
pub fn build_router(state: ApiState) -> Result<Router, CacheError> {
    let targets = InvalidationTargets::default();
    let cache_ttls = state.options.cache;

    let list_route = CacheRoute::builder()
        .namespace(targets.list_namespace.clone())
        .ttl_secs(cache_ttls.list_ttl_seconds)
        .build()?;
    let entity_route = CacheRoute::builder()
        .namespace(targets.entity_namespace.clone())
        .ttl_secs(cache_ttls.default_ttl_seconds)
        .key_fn(move |parts: &Parts| user_identity(&targets, parts))
        .build()?;

    let list_users: MethodRouter<ApiState> =
        get(handlers::users::list_users).route_layer(from_fn_with_state(
            CacheLayerState::new(state.cache.clone(), list_route),
            response_cache_layer,
        ));
    let get_user: MethodRouter<ApiState> =
        get(handlers::users::get_user).route_layer(from_fn_with_state(
            CacheLayerState::new(state.cache.clone(), entity_route),
            response_cache_layer,
        ));

    let api = Router::new()
        .route("/api/v1/health", get(handlers::system::health))
        .route(
            "/api/v1/users",
            list_users.post(handlers::users::create_user),
        )
        .route(
            "/api/v1/users/{id}",
            get_user
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            rate_limit::api_rate_limit,
        ));

    let body_limit = state.options.body_limit_bytes;

    Ok(Router::new()
        .route("/ping", get(handlers::system::ping))
        .merge(api)
        .fallback(handlers::system::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context)))
}

/// `user:{uuid}` in canonical form, matching what the invalidator deletes.
/// Unparseable ids bypass the cache and reach the handler's 400.
fn user_identity(targets: &InvalidationTargets, parts: &Parts) -> Option<String> {
    let raw = parts.uri.path().rsplit('/').next()?;
    let id = Uuid::parse_str(raw).ok()?;
    Some(targets.entity_identity(id))
}
