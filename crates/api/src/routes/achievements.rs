use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use rally_common::error::AppError;
use rally_engine::processor::AchievementStatus;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/achievements", get(list_achievements))
}

/// GET /api/achievements — Every achievement, flagged with the caller's unlocks.
async fn list_achievements(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<AchievementStatus>>, AppError> {
    let achievements = state.processor.achievements_for(auth.user_id).await?;
    Ok(Json(achievements))
}
