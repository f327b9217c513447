use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::error::ApiErrorBody;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Propagate or mint the correlation id and echo it on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = incoming_request_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;

    if let Some(mut body) = response.extensions_mut().remove::<ApiErrorBody>() {
        body.request_id = Some(request_id.clone());
        match serde_json::to_vec(&body) {
            Ok(bytes) => {
                response.headers_mut().remove(CONTENT_LENGTH);
                *response.body_mut() = Body::from(bytes);
            }
            Err(err) => warn!(
                target = "userbase::http::response",
                error = %err,
                "failed to stamp request id on error body"
            ),
        }
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

fn incoming_request_id(request: &Request<Body>) -> Option<String> {
    let raw = request.headers().get(X_REQUEST_ID)?.to_str().ok()?.trim();
    (!raw.is_empty() && raw.len() <= MAX_REQUEST_ID_LEN).then(|| raw.to_string())
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    debug!(
        target = "userbase::http::access",
        status = status.as_u16(),
        method = %method,
        path = %uri.path(),
        elapsed_ms = elapsed_ms,
        request_id = request_id,
        "request completed",
    );

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "userbase::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "userbase::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{Router, middleware::from_fn, response::IntoResponse, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::infra::http::error::ApiError;

    fn app() -> Router {
        Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route(
                "/missing",
                get(|| async { ApiError::not_found("User not found").into_response() }),
            )
            .layer(from_fn(log_responses))
            .layer(from_fn(set_request_context))
    }

    fn get_request(uri: &str, request_id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(id) = request_id {
            builder = builder.header("x-request-id", id);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn generates_request_id_when_absent() {
        let response = app().oneshot(get_request("/ok", None)).await.expect("response");
        let id = response.headers()[X_REQUEST_ID].to_str().expect("ascii");
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn echoes_incoming_request_id() {
        let response = app()
            .oneshot(get_request("/ok", Some("trace-abc")))
            .await
            .expect("response");
        assert_eq!(response.headers()[X_REQUEST_ID], "trace-abc");
    }

    #[tokio::test]
    async fn error_envelope_carries_request_id() {
        let response = app()
            .oneshot(get_request("/missing", Some("trace-404")))
            .await
            .expect("response");
        assert_eq!(response.status(), 404);

        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["request_id"], "trace-404");
        assert_eq!(body["message"], "User not found");
    }
}
