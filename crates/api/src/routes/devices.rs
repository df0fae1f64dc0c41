//! Device registration and direct notifications.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rally_common::error::AppError;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications/save-token", post(save_token))
        .route("/api/notifications/chat", post(send_chat))
}

/// Request body for token registration.
#[derive(Debug, Deserialize)]
pub struct SaveTokenRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveTokenResponse {
    pub message: String,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub receiver_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub delivered: usize,
}

/// POST /api/notifications/save-token — Attach a device token to the caller.
///
/// A token registered to another user is moved to the caller.
async fn save_token(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Result<Json<SaveTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SaveTokenResponse>), AppError> {
    // An absent or unreadable body carries no token either.
    let token = match body {
        Ok(Json(req)) => req.token,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Unreadable save-token body");
            None
        }
    }
    .ok_or_else(|| AppError::Validation("Token is required".to_string()))?;

    let registration = state.targets.register(auth.user_id, &token).await?;

    if let Some(previous) = registration.reassigned_from {
        tracing::info!(
            user_id = %auth.user_id,
            previous_owner = %previous,
            "Device token moved from previous owner"
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(SaveTokenResponse {
            message: "Token saved".to_string(),
            created: registration.created,
        }),
    ))
}

/// POST /api/notifications/chat — Notify another user of a chat message.
async fn send_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let sender_name = state
        .users
        .username(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))?;

    if state.users.username(req.receiver_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "User {} not found",
            req.receiver_id
        )));
    }

    let delivered = state
        .processor
        .send_chat(auth.user_id, &sender_name, req.receiver_id, &req.message)
        .await?;

    Ok(Json(ChatResponse { delivered }))
}
