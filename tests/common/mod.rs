#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use userbase::application::repos::{RepoError, UserCredentials, UsersRepo};
use userbase::cache::{CacheService, DisconnectedStore, KeyValueStore, MemoryStore};
use userbase::domain::users::{NewUser, User, UserChanges, UserStatus};
use userbase::infra::http::{ApiState, HttpOptions, build_router};

struct StoredUser {
    user: User,
    password_hash: String,
    deleted: bool,
}

/// Repository double with the same visibility rules as the Postgres adapter.
#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<Vec<StoredUser>>,
    offline: AtomicBool,
}

impl MemoryUsers {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn active_count(&self) -> usize {
        self.rows.lock().await.iter().filter(|row| !row.deleted).count()
    }

    fn check_online(&self) -> Result<(), RepoError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RepoError::Persistence("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UsersRepo for MemoryUsers {
    async fn list_active(&self) -> Result<Vec<User>, RepoError> {
        self.check_online()?;
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .rev()
            .filter(|row| !row.deleted)
            .map(|row| row.user.clone())
            .collect())
    }

    async fn find_active(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.check_online()?;
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|row| row.user.id == id && !row.deleted)
            .map(|row| row.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, RepoError> {
        self.check_online()?;
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|row| row.user.email == email)
            .map(|row| UserCredentials {
                user: row.user.clone(),
                password_hash: row.password_hash.clone(),
            }))
    }

    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        self.check_online()?;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            mobile_no: new.mobile_no,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().await.push(StoredUser {
            user: user.clone(),
            password_hash: new.password_hash,
            deleted: false,
        });
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError> {
        self.check_online()?;
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.iter_mut().find(|row| row.user.id == id && !row.deleted) else {
            return Ok(None);
        };
        if let Some(first_name) = changes.first_name {
            row.user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            row.user.last_name = last_name;
        }
        if let Some(email) = changes.email {
            row.user.email = email;
        }
        if let Some(mobile_no) = changes.mobile_no {
            row.user.mobile_no = Some(mobile_no);
        }
        if let Some(password_hash) = changes.password_hash {
            row.password_hash = password_hash;
        }
        row.user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.user.clone()))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, RepoError> {
        self.check_online()?;
        let mut rows = self.rows.lock().await;
        match rows.iter_mut().find(|row| row.user.id == id && !row.deleted) {
            Some(row) => {
                row.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.check_online()
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryUsers>,
    pub store: MemoryStore,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(HttpOptions::default())
    }

    pub fn with_options(options: HttpOptions) -> Self {
        let store = MemoryStore::new();
        let repo = Arc::new(MemoryUsers::default());
        let router = router_for(repo.clone(), Arc::new(store.clone()), options);
        Self {
            router,
            repo,
            store,
        }
    }

    /// App whose store was unreachable at startup.
    pub fn without_cache() -> Self {
        let repo = Arc::new(MemoryUsers::default());
        let router = router_for(
            repo.clone(),
            Arc::new(DisconnectedStore),
            HttpOptions::default(),
        );
        Self {
            router,
            repo,
            store: MemoryStore::new(),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Create a user through the API and return its id.
    pub async fn create_user(&self, name: &str, email: &str) -> Uuid {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/v1/users",
                serde_json::json!({ "name": name, "email": email, "password": "secret1" }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        let id = response.body["data"]["id"].as_str().expect("id");
        Uuid::parse_str(id).expect("uuid")
    }
}

fn router_for(
    repo: Arc<MemoryUsers>,
    store: Arc<dyn KeyValueStore>,
    options: HttpOptions,
) -> Router {
    let state = ApiState::new(repo, CacheService::new(store), options);
    build_router(state).expect("router should build")
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

pub fn get_if_none_match(uri: &str, etag: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("if-none-match", etag)
        .body(Body::empty())
        .expect("request should build")
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}
