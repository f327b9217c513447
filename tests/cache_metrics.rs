mod common;

use std::collections::HashSet;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;

use common::{TestApp, get, json_request};
use userbase::infra::http::HttpOptions;

#[tokio::test]
async fn cache_and_rate_limit_metrics_are_recorded() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = TestApp::with_options(HttpOptions {
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max_requests: 7,
        ..HttpOptions::default()
    });

    // miss, hit, invalidation, then a store error while disconnected
    let id = app.create_user("Ada Lovelace", "ada@example.com").await;
    let uri = format!("/api/v1/users/{id}");
    assert_eq!(app.send(get(&uri)).await.status, StatusCode::OK);
    assert_eq!(app.send(get(&uri)).await.status, StatusCode::OK);
    let update = app
        .send(json_request(Method::PUT, &uri, json!({ "name": "Augusta Ada" })))
        .await;
    assert_eq!(update.status, StatusCode::OK);

    app.store.set_connected(false);
    assert_eq!(app.send(get(&uri)).await.status, StatusCode::OK);
    app.store.set_connected(true);

    // 5 requests so far; exhaust the remaining budget of 7
    for _ in 0..2 {
        assert_eq!(app.send(get("/ping")).await.status, StatusCode::OK);
        app.send(get("/api/v1/users")).await;
    }
    let limited = app.send(get("/api/v1/users")).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "userbase_cache_hit_total",
        "userbase_cache_miss_total",
        "userbase_cache_store_error_total",
        "userbase_cache_invalidation_total",
        "userbase_rate_limited_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
