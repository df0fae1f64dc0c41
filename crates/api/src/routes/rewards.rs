//! Daily reward claims.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use rally_common::error::AppError;
use rally_common::types::StreakState;
use rally_engine::processor::RewardClaim;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/rewards/claim", post(claim_reward))
        .route("/api/rewards/streak", get(current_streak))
}

/// POST /api/rewards/claim — Claim today's reward. Idempotent within a day.
async fn claim_reward(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<RewardClaim>, AppError> {
    let claim = state
        .processor
        .claim_daily_reward(auth.user_id, Utc::now())
        .await?;
    Ok(Json(claim))
}

/// GET /api/rewards/streak — The caller's streak without claiming.
async fn current_streak(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<StreakState>, AppError> {
    let streak = state.processor.streak(auth.user_id).await?;
    Ok(Json(streak))
}
