pub mod achievements;
pub mod devices;
pub mod events;
pub mod health;
pub mod rewards;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(devices::router())
        .merge(events::router())
        .merge(rewards::router())
        .merge(achievements::router())
        .with_state(state)
}
