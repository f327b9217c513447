//! Cache-aside behavior of the user routes, driven through the full router.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{TestApp, delete, get, get_if_none_match, json_request};
use userbase::cache::{InvalidationTargets, derive_cache_key};

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let app = TestApp::new();
    let id = app.create_user("Ada Lovelace", "ada@example.com").await;
    let uri = format!("/api/v1/users/{id}");

    let first = app.send(get(&uri)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header("x-cache"), Some("MISS"));
    let etag = first.header("etag").expect("etag").to_string();

    let second = app.send(get(&uri)).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.header("x-cache"), Some("HIT"));
    assert_eq!(second.header("etag"), Some(etag.as_str()));
    assert_eq!(second.body, first.body);
}

#[tokio::test]
async fn matching_etag_yields_not_modified() {
    let app = TestApp::new();
    app.create_user("Ada Lovelace", "ada@example.com").await;

    let first = app.send(get("/api/v1/users")).await;
    let etag = first.header("etag").expect("etag").to_string();

    let conditional = app.send(get_if_none_match("/api/v1/users", &etag)).await;
    assert_eq!(conditional.status, StatusCode::NOT_MODIFIED);
    assert_eq!(conditional.header("x-cache"), Some("HIT"));
    assert_eq!(conditional.header("etag"), Some(etag.as_str()));
    assert!(conditional.body.is_null());

    let stale = app
        .send(get_if_none_match("/api/v1/users", "\"something-else\""))
        .await;
    assert_eq!(stale.status, StatusCode::OK);
    assert_eq!(stale.header("x-cache"), Some("HIT"));
}

#[tokio::test]
async fn update_invalidates_entity_and_listing() {
    let app = TestApp::new();
    let id = app.create_user("Ada Lovelace", "ada@example.com").await;
    let uri = format!("/api/v1/users/{id}");

    let list_before = app.send(get("/api/v1/users")).await;
    let list_etag = list_before.header("etag").expect("etag").to_string();
    let entity_before = app.send(get(&uri)).await;
    assert_eq!(app.send(get("/api/v1/users")).await.header("x-cache"), Some("HIT"));
    assert_eq!(app.send(get(&uri)).await.header("x-cache"), Some("HIT"));

    let updated = app
        .send(json_request(Method::PUT, &uri, json!({ "name": "Augusta Ada" })))
        .await;
    assert_eq!(updated.status, StatusCode::OK);

    let list_after = app.send(get("/api/v1/users")).await;
    assert_eq!(list_after.header("x-cache"), Some("MISS"));
    assert_ne!(list_after.header("etag"), Some(list_etag.as_str()));
    assert_eq!(list_after.body["data"][0]["first_name"], "Augusta");

    let entity_after = app.send(get(&uri)).await;
    assert_eq!(entity_after.header("x-cache"), Some("MISS"));
    assert_ne!(entity_after.body, entity_before.body);
    assert_eq!(entity_after.body["data"]["last_name"], "Ada");
}

#[tokio::test]
async fn create_flushes_listings() {
    let app = TestApp::new();
    app.create_user("Ada Lovelace", "ada@example.com").await;

    app.send(get("/api/v1/users")).await;
    assert_eq!(app.send(get("/api/v1/users")).await.header("x-cache"), Some("HIT"));

    app.create_user("Grace Hopper", "grace@example.com").await;

    let list = app.send(get("/api/v1/users")).await;
    assert_eq!(list.header("x-cache"), Some("MISS"));
    assert_eq!(list.body["meta"]["count"], 2);
}

#[tokio::test]
async fn delete_drops_the_cached_entity() {
    let app = TestApp::new();
    let id = app.create_user("Ada Lovelace", "ada@example.com").await;
    let uri = format!("/api/v1/users/{id}");

    app.send(get(&uri)).await;
    let key = derive_cache_key("users", &InvalidationTargets::default().entity_identity(id));
    assert!(app.store.contains(&format!("users:{key}")));

    assert_eq!(app.send(delete(&uri)).await.status, StatusCode::OK);
    assert!(!app.store.contains(&format!("users:{key}")));

    let after = app.send(get(&uri)).await;
    assert_eq!(after.status, StatusCode::NOT_FOUND);
    assert!(after.header("x-cache").is_none());
}

#[tokio::test]
async fn non_canonical_id_shares_the_canonical_entry() {
    let app = TestApp::new();
    let id = app.create_user("Ada Lovelace", "ada@example.com").await;
    let upper = format!("/api/v1/users/{}", id.to_string().to_uppercase());
    let lower = format!("/api/v1/users/{id}");

    assert_eq!(app.send(get(&upper)).await.header("x-cache"), Some("MISS"));
    assert_eq!(app.send(get(&lower)).await.header("x-cache"), Some("HIT"));

    app.send(json_request(Method::PUT, &lower, json!({ "mobile_no": "5551234567" })))
        .await;
    let refreshed = app.send(get(&upper)).await;
    assert_eq!(refreshed.header("x-cache"), Some("MISS"));
    assert_eq!(refreshed.body["data"]["mobile_no"], "5551234567");
}

#[tokio::test]
async fn store_outage_degrades_to_miss() {
    let app = TestApp::new();
    let id = app.create_user("Ada Lovelace", "ada@example.com").await;
    let uri = format!("/api/v1/users/{id}");
    app.send(get(&uri)).await;

    app.store.set_connected(false);

    let during = app.send(get(&uri)).await;
    assert_eq!(during.status, StatusCode::OK);
    assert_eq!(during.header("x-cache"), Some("MISS"));
    assert!(during.header("etag").is_some());

    let write = app
        .send(json_request(Method::PUT, &uri, json!({ "name": "Augusta Ada" })))
        .await;
    assert_eq!(write.status, StatusCode::OK);

    app.store.set_connected(true);
}

#[tokio::test]
async fn errors_are_never_cached() {
    let app = TestApp::new();
    let uri = format!("/api/v1/users/{}", uuid::Uuid::new_v4());

    let first = app.send(get(&uri)).await;
    assert_eq!(first.status, StatusCode::NOT_FOUND);
    let second = app.send(get(&uri)).await;
    assert_eq!(second.status, StatusCode::NOT_FOUND);
    assert!(second.header("x-cache").is_none());
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn disconnected_store_is_a_permanent_miss() {
    let app = TestApp::without_cache();
    let id = app.create_user("Ada Lovelace", "ada@example.com").await;
    let uri = format!("/api/v1/users/{id}");

    for _ in 0..2 {
        let response = app.send(get(&uri)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("x-cache"), Some("MISS"));
        assert!(response.header("etag").is_some());
    }
}
