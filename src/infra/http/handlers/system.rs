use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use tracing::warn;

use crate::infra::http::error::ApiError;
use crate::infra::http::models::{ApiResponse, HealthChecks, HealthReport, PingResponse};
use crate::infra::http::state::ApiState;

pub async fn ping(State(state): State<ApiState>) -> impl IntoResponse {
    Json(PingResponse {
        success: true,
        message: "pong",
        environment: state.environment().as_str(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Database outage is fatal (503); cache outage only degrades.
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let (database, cache_alive) = tokio::join!(state.repo.ping(), state.cache.ping());

    let database_up = match database {
        Ok(()) => true,
        Err(err) => {
            warn!(
                target = "userbase::http::health",
                error = %err,
                "database health check failed"
            );
            false
        }
    };
    let cache = match (state.cache_enabled, cache_alive) {
        (false, _) => "disabled",
        (true, true) => "up",
        (true, false) => "down",
    };

    let (status, label) = match (database_up, cache) {
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        (true, "down") => (StatusCode::OK, "degraded"),
        (true, _) => (StatusCode::OK, "ok"),
    };

    ApiResponse::new(
        status,
        format!("Service is {label}"),
        HealthReport {
            status: label,
            environment: state.environment().as_str(),
            uptime_seconds: state.uptime_seconds(),
            checks: HealthChecks {
                database: if database_up { "up" } else { "down" },
                cache,
            },
        },
    )
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {} not found", uri.path()))
}
