use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::libs::error::MessagingError;
use crate::libs::storage::database::storage_traits::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Messaging(MessagingError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Messaging(MessagingError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, msg.clone())
            }
            AppError::Messaging(MessagingError::Conflict(msg)) => {
                (StatusCode::CONFLICT, msg.clone())
            }
            AppError::Messaging(MessagingError::Storage(err)) => {
                error!("Storage failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, String::from("Database error"))
            }
            AppError::InternalError(err) => {
                error!("Internal failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, String::from("Server error"))
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Store Error: {0}")]
    Store(#[from] StoreError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
}
