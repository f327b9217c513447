use thiserror::Error;

use super::store::StoreError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable")]
    StoreUnavailable,
    #[error("cache store timed out")]
    StoreTimeout,
    #[error("cache store command failed: {0}")]
    Store(String),
    #[error("cache payload could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid cache configuration: {message}")]
    Configuration { message: String },
}

impl CacheError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable => Self::StoreUnavailable,
            StoreError::Timeout => Self::StoreTimeout,
            StoreError::Command(message) => Self::Store(message),
        }
    }
}
