use crate::libs::core::models::PairError;
use crate::libs::storage::database::storage_traits::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Storage Error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for MessagingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserAlreadyExists(msg) => MessagingError::Conflict(msg),
            other => MessagingError::Storage(other),
        }
    }
}

impl From<PairError> for MessagingError {
    fn from(err: PairError) -> Self {
        MessagingError::Validation(err.to_string())
    }
}

impl MessagingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MessagingError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        MessagingError::NotFound(msg.into())
    }
}
