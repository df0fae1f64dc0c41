//! Rally HTTP API.
//!
//! Endpoints:
//! - POST /api/notifications/save-token — register a device token
//! - POST /api/notifications/chat — push a chat message to another user
//! - POST /api/events/game-stats — games-won changed, check win achievements
//! - POST /api/events/streak — daily streak changed, check streak achievements
//! - POST /api/rewards/claim — claim today's reward and extend the streak
//! - GET  /api/rewards/streak — current streak
//! - GET  /api/achievements — catalog with the caller's unlocks
//! - GET  /health

pub mod middleware;
pub mod routes;
pub mod state;
