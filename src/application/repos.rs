//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::users::{NewUser, User, UserChanges};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Stored user plus the password hash, for flows that need to verify or replace it.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Users that are not soft-deleted are "active" for every read below.
#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn list_active(&self) -> Result<Vec<User>, RepoError>;

    async fn find_active(&self, id: Uuid) -> Result<Option<User>, RepoError>;

    /// Lookup across every row, soft-deleted included, since the unique
    /// constraint covers them too.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, RepoError>;

    async fn create(&self, user: NewUser) -> Result<User, RepoError>;

    /// Apply `changes` to an active user. `Ok(None)` when no active row matched.
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError>;

    /// Stamp `deleted_at`. Returns whether an active row was affected.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, RepoError>;

    /// Cheap round-trip used by the health endpoint.
    async fn ping(&self) -> Result<(), RepoError>;
}
