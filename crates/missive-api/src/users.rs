use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use missive_types::api::{RegisterRequest, ResolveResponse};
use missive_types::models::User;

use crate::AppState;
use crate::error::status_for;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.id.trim().is_empty() || req.username.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let ctx = state.request_context();
    state
        .store
        .register_user(&ctx, &req.id, &req.username)
        .await
        .map_err(|e| status_for("register_user", e))?;

    info!("User {} registered as {}", req.id, req.username);

    Ok((
        StatusCode::CREATED,
        Json(User {
            id: req.id,
            username: req.username,
        }),
    ))
}

pub async fn resolve(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ResolveResponse>, StatusCode> {
    let ctx = state.request_context();
    let user_id = state
        .store
        .find_recipient(&ctx, &username)
        .await
        .map_err(|e| status_for("find_recipient", e))?;

    Ok(Json(ResolveResponse { user_id }))
}
