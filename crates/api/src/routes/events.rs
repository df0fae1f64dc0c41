//! Inbound domain events from the game backend.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use rally_common::error::AppError;
use rally_common::types::{Achievement, StatUpdateEvent, StreakUpdateEvent};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events/game-stats", post(game_stats_updated))
        .route("/api/events/streak", post(streak_updated))
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub unlocked: Vec<Achievement>,
}

/// POST /api/events/game-stats — Games-won changed; unlock win achievements.
async fn game_stats_updated(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(event): Json<StatUpdateEvent>,
) -> Result<Json<UnlockResponse>, AppError> {
    auth.ensure_is(event.user_id)?;
    let unlocked = state.processor.handle_stat_update(&event).await?;
    Ok(Json(UnlockResponse { unlocked }))
}

/// POST /api/events/streak — Daily streak changed; unlock streak achievements.
async fn streak_updated(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(event): Json<StreakUpdateEvent>,
) -> Result<Json<UnlockResponse>, AppError> {
    auth.ensure_is(event.user_id)?;
    let unlocked = state.processor.handle_streak_update(&event).await?;
    Ok(Json(UnlockResponse { unlocked }))
}
