use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use missive_types::api::{BatchSendRequest, BatchSendResponse, SendMessageRequest};
use missive_types::models::{Message, MessageHeader, NewMessage};

use crate::AppState;
use crate::error::status_for;

/// Send to a recipient addressed by username.
pub async fn send_message(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<StatusCode, StatusCode> {
    let ctx = state.request_context();

    let recipient = state
        .store
        .find_recipient(&ctx, &username)
        .await
        .map_err(|e| status_for("find_recipient", e))?;

    let msg = NewMessage::now(req.sender, recipient.as_str(), req.payload);
    state
        .store
        .save_message(&ctx, &recipient, &msg)
        .await
        .map_err(|e| status_for("save_message", e))?;

    Ok(StatusCode::CREATED)
}

/// Batch send; each message names its own recipient id and timestamp.
pub async fn send_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchSendRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let ctx = state.request_context();
    let stored = req.messages.len();

    state
        .store
        .save_messages(&ctx, req.messages)
        .await
        .map_err(|e| status_for("save_messages", e))?;

    Ok((StatusCode::CREATED, Json(BatchSendResponse { stored })))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<MessageHeader>>, StatusCode> {
    let ctx = state.request_context();
    let headers = state
        .store
        .list_messages(&ctx, &user_id)
        .await
        .map_err(|e| status_for("list_messages", e))?;

    Ok(Json(headers))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Message>, StatusCode> {
    let ctx = state.request_context();
    let msg = state
        .store
        .get_message(&ctx, id)
        .await
        .map_err(|e| status_for("get_message", e))?;

    Ok(Json(msg))
}
