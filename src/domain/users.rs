//! The user entity and its field rules.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 6;
pub const MOBILE_MIN_CHARS: usize = 8;
pub const MOBILE_MAX_CHARS: usize = 15;
const EMAIL_MAX_CHARS: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Inactive,
    Active,
}

impl UserStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Inactive => 0,
            Self::Active => 1,
        }
    }
}

impl TryFrom<i16> for UserStatus {
    type Error = DomainError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Inactive),
            1 => Ok(Self::Active),
            other => Err(DomainError::invariant(format!(
                "unknown user status code {other}"
            ))),
        }
    }
}

/// A stored user. The password hash never leaves the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub mobile_no: Option<String>,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert payload handed to the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub mobile_no: Option<String>,
    pub password_hash: String,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<Option<String>>,
    pub email: Option<String>,
    pub mobile_no: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.mobile_no.is_none()
            && self.password_hash.is_none()
    }
}

/// Full name split on the first run of whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub first: String,
    pub last: Option<String>,
}

impl PersonName {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let name = raw.trim();
        let len = name.chars().count();
        if len < NAME_MIN_CHARS {
            return Err(DomainError::validation(
                "name",
                format!("must be at least {NAME_MIN_CHARS} characters long"),
            ));
        }
        if len > NAME_MAX_CHARS {
            return Err(DomainError::validation(
                "name",
                format!("must be at most {NAME_MAX_CHARS} characters long"),
            ));
        }

        match name.split_once(char::is_whitespace) {
            Some((first, rest)) => {
                let rest = rest.trim();
                Ok(Self {
                    first: first.to_string(),
                    last: (!rest.is_empty()).then(|| rest.to_string()),
                })
            }
            None => Ok(Self {
                first: name.to_string(),
                last: None,
            }),
        }
    }
}

/// Lowercased, trimmed address with a plausible `local@domain.tld` shape.
pub fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_ascii_lowercase();
    if email.chars().count() > EMAIL_MAX_CHARS {
        return Err(DomainError::validation(
            "email",
            format!("must be at most {EMAIL_MAX_CHARS} characters long"),
        ));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .rsplit_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && tld.len() >= 2)
                && !domain.starts_with('.')
                && !domain.contains("..")
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(DomainError::validation("email", "must be a valid email"))
    }
}

pub fn validate_password(raw: &str) -> Result<(), DomainError> {
    if raw.chars().count() < PASSWORD_MIN_CHARS {
        return Err(DomainError::validation(
            "password",
            format!("must be at least {PASSWORD_MIN_CHARS} characters long"),
        ));
    }
    Ok(())
}

pub fn normalize_mobile(raw: &str) -> Result<String, DomainError> {
    let mobile = raw.trim();
    let len = mobile.chars().count();
    if !(MOBILE_MIN_CHARS..=MOBILE_MAX_CHARS).contains(&len) {
        return Err(DomainError::validation(
            "mobile_no",
            format!("must be between {MOBILE_MIN_CHARS} and {MOBILE_MAX_CHARS} characters long"),
        ));
    }
    Ok(mobile.to_string())
}
