use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::application::users::UserServiceError;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{ApiResponse, CreateUserRequest, UpdateUserRequest};
use crate::infra::http::state::ApiState;
use crate::infra::http::validation::{PathId, ValidatedJson};

fn user_error(state: &ApiState, err: UserServiceError) -> ApiError {
    ApiError::from_user_error(err, state.environment())
}

pub async fn list_users(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .users
        .list()
        .await
        .map_err(|err| user_error(&state, err))?;
    let count = users.len();

    Ok(ApiResponse::ok("Users fetched successfully", users).with_meta(json!({ "count": count })))
}

pub async fn get_user(
    State(state): State<ApiState>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .get(id)
        .await
        .map_err(|err| user_error(&state, err))?;

    Ok(ApiResponse::ok("User fetched successfully", user))
}

pub async fn create_user(
    State(state): State<ApiState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .create(payload.into())
        .await
        .map_err(|err| user_error(&state, err))?;

    Ok(ApiResponse::created("User created successfully", user))
}

pub async fn update_user(
    State(state): State<ApiState>,
    PathId(id): PathId,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .update(id, payload.into())
        .await
        .map_err(|err| user_error(&state, err))?;

    Ok(ApiResponse::ok("User updated successfully", user))
}

pub async fn delete_user(
    State(state): State<ApiState>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, ApiError> {
    state
        .users
        .delete(id)
        .await
        .map_err(|err| user_error(&state, err))?;

    Ok(ApiResponse::ok("User deleted successfully", json!({})))
}
