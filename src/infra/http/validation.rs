//! Request extractors that reject with the JSON error envelope.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::{ApiError, codes};

/// Field rules checked after deserialization. Returns every violation.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<String>>;
}

/// `Json<T>` that also runs [`Validate`].
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(json_rejection)?;
        value
            .validate()
            .map_err(|violations| ApiError::validation("body", &violations))?;
        Ok(Self(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(err) => ApiError::validation("body", &[err.body_text()]),
        JsonRejection::JsonSyntaxError(err) => {
            ApiError::bad_request("Malformed JSON body").with_detail(err.body_text())
        }
        JsonRejection::MissingJsonContentType(_) => ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Some(codes::UNSUPPORTED_MEDIA_TYPE),
            "Expected request with `Content-Type: application/json`",
        ),
        other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::payload_too_large().with_detail(other.body_text())
        }
        other => ApiError::new(other.status(), None, other.body_text()),
    }
}

/// The `{id}` path segment parsed as a UUID.
#[derive(Debug, Clone, Copy)]
pub struct PathId(pub Uuid);

impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|err| {
                ApiError::validation("params", &["`id` is required".to_string()])
                    .with_detail(err.body_text())
            })?;

        Uuid::parse_str(raw.trim()).map(Self).map_err(|_| {
            ApiError::validation("params", &["`id` must be a valid UUID".to_string()])
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::routing::{get, post};
    use axum::{Router, extract::DefaultBodyLimit};
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: Option<String>,
        age: Option<u32>,
    }

    impl Validate for Payload {
        fn validate(&self) -> Result<(), Vec<String>> {
            let mut violations = Vec::new();
            if self.name.as_deref().is_none_or(str::is_empty) {
                violations.push("`name` is required".to_string());
            }
            if self.age.is_none() {
                violations.push("`age` is required".to_string());
            }
            if violations.is_empty() {
                Ok(())
            } else {
                Err(violations)
            }
        }
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                post(|ValidatedJson(payload): ValidatedJson<Payload>| async move {
                    payload.name.unwrap_or_default()
                }),
            )
            .route(
                "/items/{id}",
                get(|PathId(id): PathId| async move { id.to_string() }),
            )
            .layer(DefaultBodyLimit::max(64))
    }

    async fn send(request: axum::http::Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_json(body: impl Into<String>) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/echo")
            .header("content-type", "application/json")
            .body(Body::from(body.into()))
            .expect("request")
    }

    #[tokio::test]
    async fn collects_every_violation() {
        let (status, body) = send(post_json("{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Validation error in body: `name` is required, `age` is required"
        );
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (status, body) = send(post_json("{\"name\": ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Malformed JSON body");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let big = format!("{{\"name\": \"{}\"}}", "x".repeat(256));
        let (status, body) = send(post_json(big)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error_code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn path_id_requires_uuid() {
        let request = axum::http::Request::builder()
            .uri("/items/not-a-uuid")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Validation error in params: `id` must be a valid UUID"
        );
    }
}
