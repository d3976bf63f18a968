use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::libs::core::models::RecordId;
use crate::libs::error::MessagingError;
use crate::libs::messaging::MessagingService;

use super::{error::AppError, state::State};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    #[serde(default)]
    user1_email: String,
    #[serde(default)]
    user2_email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    sender_email: String,
    #[serde(default)]
    message: String,
}

/// Runs a store operation on the blocking pool.
async fn blocking<T, F>(state: &State, operation: F) -> Result<T, AppError>
where
    F: FnOnce(&MessagingService) -> Result<T, MessagingError> + Send + 'static,
    T: Send + 'static,
{
    let messaging = state.messaging.clone();
    let result = tokio::task::spawn_blocking(move || operation(&messaging))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(result?)
}

/// Unknown or malformed ids can never match a stored record.
fn parse_id(raw: &str, what: &str) -> Result<RecordId, AppError> {
    raw.parse()
        .map_err(|_| AppError::from(MessagingError::not_found(format!("{what} not found"))))
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "Backend server is running!" }))
}

pub async fn list_conversations_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let conversations =
        blocking(&state, move |messaging| messaging.list_conversations_for_user(&email)).await?;

    Ok(Json(json!({ "conversations": conversations })))
}

pub async fn create_conversation_handler(
    AxumState(state): AxumState<Arc<State>>,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let conversation = blocking(&state, move |messaging| {
        messaging.find_or_create_conversation(&payload.user1_email, &payload.user2_email)
    })
    .await?;

    Ok(Json(json!({ "conversation": conversation })))
}

pub async fn list_messages_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let conversation_id = parse_id(&conversation_id, "Conversation")?;
    let messages =
        blocking(&state, move |messaging| messaging.list_messages(&conversation_id)).await?;

    Ok(Json(json!({ "messages": messages })))
}

pub async fn append_message_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(conversation_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let conversation_id = parse_id(&conversation_id, "Conversation")?;
    let message = blocking(&state, move |messaging| {
        messaging.append_message(&conversation_id, &payload.sender_email, &payload.message)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn user_by_email_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = blocking(&state, move |messaging| messaging.load_user_by_email(&email)).await?;

    Ok(Json(json!({ "user": user })))
}

pub async fn user_by_id_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_id(&user_id, "User")?;
    let user = blocking(&state, move |messaging| messaging.load_user_by_id(&user_id)).await?;

    Ok(Json(json!({ "user": user })))
}
