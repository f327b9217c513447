//! User CRUD with cache invalidation after every committed write.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::application::repos::{RepoError, UsersRepo};
use crate::cache::CacheInvalidator;
use crate::domain::{
    error::DomainError,
    users::{
        NewUser, PersonName, User, UserChanges, normalize_email, normalize_mobile,
        validate_password,
    },
};

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("email already exists")]
    EmailTaken,
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("password could not be hashed: {0}")]
    Password(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for UserServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { .. } => Self::NotFound,
            other => Self::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub name: String,
    pub email: String,
    pub password: String,
    pub mobile_no: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUserCommand {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub mobile_no: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UsersRepo>,
    invalidator: Option<CacheInvalidator>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UsersRepo>) -> Self {
        Self {
            repo,
            invalidator: None,
        }
    }

    /// Set the cache invalidator run after writes.
    pub fn with_invalidator(mut self, invalidator: CacheInvalidator) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    pub async fn list(&self) -> Result<Vec<User>, UserServiceError> {
        self.repo
            .list_active()
            .await
            .map_err(UserServiceError::from)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, UserServiceError> {
        self.repo
            .find_active(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    #[instrument(skip_all)]
    pub async fn create(&self, command: CreateUserCommand) -> Result<User, UserServiceError> {
        let name = PersonName::parse(&command.name)?;
        let email = normalize_email(&command.email)?;
        validate_password(&command.password)?;
        let mobile_no = command
            .mobile_no
            .as_deref()
            .map(normalize_mobile)
            .transpose()?;

        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(UserServiceError::EmailTaken);
        }

        let password_hash = hash_password(command.password).await?;
        let user = self
            .repo
            .create(NewUser {
                first_name: name.first,
                last_name: name.last,
                email,
                mobile_no,
                password_hash,
            })
            .await
            .map_err(map_write_error)?;

        info!(user_id = %user.id, "user created");
        self.invalidate(user.id).await;
        Ok(user)
    }

    #[instrument(skip_all, fields(user_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateUserCommand,
    ) -> Result<User, UserServiceError> {
        let mut changes = UserChanges::default();

        if let Some(raw) = command.name.as_deref() {
            let name = PersonName::parse(raw)?;
            changes.first_name = Some(name.first);
            changes.last_name = Some(name.last);
        }
        if let Some(raw) = command.email.as_deref() {
            let email = normalize_email(raw)?;
            if let Some(existing) = self.repo.find_by_email(&email).await?
                && existing.user.id != id
            {
                return Err(UserServiceError::EmailTaken);
            }
            changes.email = Some(email);
        }
        if let Some(raw) = command.mobile_no.as_deref() {
            changes.mobile_no = Some(normalize_mobile(raw)?);
        }
        if let Some(password) = command.password {
            validate_password(&password)?;
            changes.password_hash = Some(hash_password(password).await?);
        }

        if changes.is_empty() {
            return Err(UserServiceError::Validation(
                "at least one field must be provided".to_string(),
            ));
        }

        let user = self
            .repo
            .update(id, changes)
            .await
            .map_err(map_write_error)?
            .ok_or(UserServiceError::NotFound)?;

        info!("user updated");
        self.invalidate(id).await;
        Ok(user)
    }

    #[instrument(skip_all, fields(user_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), UserServiceError> {
        if !self.repo.soft_delete(id).await? {
            return Err(UserServiceError::NotFound);
        }

        info!("user soft-deleted");
        self.invalidate(id).await;
        Ok(())
    }

    async fn invalidate(&self, id: Uuid) {
        match &self.invalidator {
            Some(invalidator) => invalidator.entity_changed(id).await,
            None => debug!(user_id = %id, "no cache invalidator configured"),
        }
    }
}

fn map_write_error(err: RepoError) -> UserServiceError {
    match err {
        RepoError::Duplicate { constraint } if constraint.contains("email") => {
            UserServiceError::EmailTaken
        }
        other => UserServiceError::Repo(other),
    }
}

/// Argon2id hash in PHC string form, computed off the async executor.
async fn hash_password(password: String) -> Result<String, UserServiceError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|err| UserServiceError::Password(err.to_string()))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| UserServiceError::Password(err.to_string()))
    })
    .await
    .map_err(|err| UserServiceError::Password(err.to_string()))?
}
