use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::users::{CreateUserCommand, UpdateUserCommand};
use crate::domain::users::{PersonName, normalize_email, normalize_mobile, validate_password};

use super::validation::Validate;

/// Success envelope wrapping every handler payload.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status,
            success: status.is_success(),
            status_code: status.as_u16(),
            message: message.into(),
            data,
            meta: None,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::CREATED, message, data)
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub success: bool,
    pub message: &'static str,
    pub environment: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub environment: &'static str,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: &'static str,
    pub cache: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub mobile_no: Option<String>,
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();

        match self.name.as_deref() {
            Some(name) => push_err(&mut violations, PersonName::parse(name).map(drop)),
            None => violations.push(required("name")),
        }
        match self.email.as_deref() {
            Some(email) => push_err(&mut violations, normalize_email(email).map(drop)),
            None => violations.push(required("email")),
        }
        match self.password.as_deref() {
            Some(password) => push_err(&mut violations, validate_password(password)),
            None => violations.push(required("password")),
        }
        if let Some(mobile) = self.mobile_no.as_deref() {
            push_err(&mut violations, normalize_mobile(mobile).map(drop));
        }

        finish(violations)
    }
}

impl From<CreateUserRequest> for CreateUserCommand {
    fn from(request: CreateUserRequest) -> Self {
        Self {
            name: request.name.unwrap_or_default(),
            email: request.email.unwrap_or_default(),
            password: request.password.unwrap_or_default(),
            mobile_no: request.mobile_no,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub mobile_no: Option<String>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        if self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.mobile_no.is_none()
        {
            return Err(vec!["at least one field must be provided".to_string()]);
        }

        let mut violations = Vec::new();
        if let Some(name) = self.name.as_deref() {
            push_err(&mut violations, PersonName::parse(name).map(drop));
        }
        if let Some(email) = self.email.as_deref() {
            push_err(&mut violations, normalize_email(email).map(drop));
        }
        if let Some(password) = self.password.as_deref() {
            push_err(&mut violations, validate_password(password));
        }
        if let Some(mobile) = self.mobile_no.as_deref() {
            push_err(&mut violations, normalize_mobile(mobile).map(drop));
        }

        finish(violations)
    }
}

impl From<UpdateUserRequest> for UpdateUserCommand {
    fn from(request: UpdateUserRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            password: request.password,
            mobile_no: request.mobile_no,
        }
    }
}

fn required(field: &str) -> String {
    format!("`{field}` is required")
}

fn push_err<E: ToString>(violations: &mut Vec<String>, result: Result<(), E>) {
    if let Err(err) = result {
        violations.push(err.to_string());
    }
}

fn finish(violations: Vec<String>) -> Result<(), Vec<String>> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
