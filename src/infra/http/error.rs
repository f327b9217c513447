use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use time::OffsetDateTime;

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use crate::application::users::UserServiceError;
use crate::config::AppEnvironment;

pub mod codes {
    pub const VALIDATION: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const EMAIL_TAKEN: &str = "EMAIL_ALREADY_EXISTS";
    pub const DUPLICATE: &str = "DUPLICATE_RECORD";
    pub const INTEGRITY: &str = "INTEGRITY_ERROR";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "UNSUPPORTED_MEDIA_TYPE";
    pub const DB_TIMEOUT: &str = "DB_TIMEOUT";
    pub const INTERNAL: &str = "INTERNAL_ERROR";
}

const SOURCE: &str = "infra::http";
const HIDDEN_MESSAGE: &str = "Internal server error";

/// Error envelope shared by every failing response.
///
/// Also stored in the response extensions so `set_request_context` can
/// re-render it with the request id.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: Option<&'static str>,
    message: String,
    detail: Option<String>,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: Option<&'static str>, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            detail: None,
            retry_after: None,
        }
    }

    /// Diagnostic kept out of the body and reported by `log_responses`.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn validation(location: &str, violations: &[String]) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            Some(codes::VALIDATION),
            format!("Validation error in {location}: {}", violations.join(", ")),
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, Some(codes::VALIDATION), message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, Some(codes::NOT_FOUND), message)
    }

    pub fn payload_too_large() -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            Some(codes::PAYLOAD_TOO_LARGE),
            "Request body too large",
        )
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                Some(codes::RATE_LIMITED),
                "Too many requests, please try again later",
            )
            .with_detail(format!("rate_limited: retry_after={retry_after}"))
        }
    }

    pub fn internal(environment: AppEnvironment, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let message = if environment.is_production() {
            HIDDEN_MESSAGE.to_string()
        } else {
            detail.clone()
        };
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, Some(codes::INTERNAL), message)
            .with_detail(detail)
    }

    /// Map a user service failure; 5xx messages are hidden in production.
    pub fn from_user_error(err: UserServiceError, environment: AppEnvironment) -> Self {
        match err {
            UserServiceError::EmailTaken => Self::new(
                StatusCode::CONFLICT,
                Some(codes::EMAIL_TAKEN),
                "Email already exists",
            ),
            UserServiceError::NotFound => Self::new(
                StatusCode::NOT_FOUND,
                Some(codes::USER_NOT_FOUND),
                "User not found",
            ),
            UserServiceError::Validation(message) => {
                Self::validation("body", std::slice::from_ref(&message))
            }
            UserServiceError::Password(detail) => Self::internal(environment, detail),
            UserServiceError::Repo(err) => Self::from_repo_error(err, environment),
        }
    }

    pub fn from_repo_error(err: RepoError, environment: AppEnvironment) -> Self {
        match err {
            RepoError::Duplicate { constraint } => Self::new(
                StatusCode::CONFLICT,
                Some(codes::DUPLICATE),
                "Duplicate record",
            )
            .with_detail(constraint),
            RepoError::NotFound => Self::new(
                StatusCode::NOT_FOUND,
                Some(codes::NOT_FOUND),
                "Resource not found",
            ),
            RepoError::InvalidInput { message } => Self::bad_request(message),
            RepoError::Integrity { message } => Self::new(
                StatusCode::CONFLICT,
                Some(codes::INTEGRITY),
                "Integrity constraint violated",
            )
            .with_detail(message),
            RepoError::Timeout => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                Some(codes::DB_TIMEOUT),
                "Database timeout",
            ),
            RepoError::Persistence(message) => Self::internal(environment, message),
        }
    }

    fn body(&self) -> ApiErrorBody {
        ApiErrorBody {
            success: false,
            status_code: self.status.as_u16(),
            error_code: self.code,
            message: self.message.clone(),
            timestamp: OffsetDateTime::now_utc(),
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        let mut response = (self.status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);

        if let Some(retry_after) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }

        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        ErrorReport::from_message(
            SOURCE,
            self.status,
            format!(
                "{}: {}",
                self.code.unwrap_or("error"),
                self.detail.as_deref().unwrap_or(&self.message)
            ),
        )
        .attach(&mut response);
        response
    }
}
