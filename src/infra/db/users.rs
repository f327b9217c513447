use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, UserCredentials, UsersRepo},
    domain::users::{NewUser, User, UserChanges, UserStatus},
};

use super::{PostgresRepositories, map_sqlx_error};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, mobile_no, password_hash, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: Option<String>,
    email: String,
    mobile_no: Option<String>,
    password_hash: String,
    status: i16,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl UserRow {
    fn into_credentials(self) -> Result<UserCredentials, RepoError> {
        let status = UserStatus::try_from(self.status).map_err(|err| RepoError::Integrity {
            message: err.to_string(),
        })?;

        Ok(UserCredentials {
            user: User {
                id: self.id,
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                mobile_no: self.mobile_no,
                status,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        })
    }

    fn into_user(self) -> Result<User, RepoError> {
        self.into_credentials().map(|credentials| credentials.user)
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn list_active(&self) -> Result<Vec<User>, RepoError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn find_active(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(UserRow::into_credentials).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            "INSERT INTO users (id, first_name, last_name, email, mobile_no, password_hash, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.first_name)
            .bind(user.last_name)
            .bind(user.email)
            .bind(user.mobile_no)
            .bind(user.password_hash)
            .bind(UserStatus::Active.as_i16())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.into_user()
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError> {
        if changes.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "update requires at least one column".to_string(),
            });
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = now()");
        if let Some(first_name) = changes.first_name {
            qb.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = changes.last_name {
            qb.push(", last_name = ").push_bind(last_name);
        }
        if let Some(email) = changes.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(mobile_no) = changes.mobile_no {
            qb.push(", mobile_no = ").push_bind(mobile_no);
        }
        if let Some(password_hash) = changes.password_hash {
            qb.push(", password_hash = ").push_bind(password_hash);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL RETURNING ")
            .push(USER_COLUMNS);

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = now(), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
