//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server.
//! State is wired with the in-memory stores and a recording push transport,
//! so no database is needed.
//!
//! ```bash
//! cargo test -p rally-api --test integration -- --nocapture
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use rally_api::routes::create_router;
use rally_api::state::AppState;
use rally_common::config::AppConfig;
use rally_common::directory::MemoryUserDirectory;
use rally_common::types::NotificationPayload;
use rally_engine::achievements::MemoryAchievementStore;
use rally_engine::catalog::default_catalog;
use rally_engine::processor::EventProcessor;
use rally_engine::streak::MemoryStreakStore;
use rally_notifier::{MemoryTargetStore, PushError, PushNotifier, PushTransport, TargetStore};

// ============================================================
// Helpers
// ============================================================

/// Records every push instead of sending it.
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, NotificationPayload)>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<(String, NotificationPayload)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(&self, token: &str, payload: &NotificationPayload) -> Result<String, PushError> {
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), payload.clone()));
        Ok(format!("projects/test/messages/{}", token))
    }
}

/// Create a test AppConfig with a specific JWT secret.
fn test_config() -> AppConfig {
    AppConfig {
        database_url: "unused".to_string(),
        redis_url: "redis://localhost:6379".to_string(),
        db_max_connections: 5,
        api_port: 0,
        jwt_secret: "test-jwt-secret-for-integration-tests".to_string(),
        jwt_expiry_hours: 24,
        fcm_project_id: None,
        fcm_access_token: None,
        fcm_endpoint: "http://unused".to_string(),
        push_timeout_secs: 5,
        reminder_interval_secs: 86_400,
        reminder_max_retries: 3,
        reminder_retry_backoff_secs: 60,
    }
}

struct TestApp {
    state: AppState,
    transport: Arc<RecordingTransport>,
    targets: Arc<MemoryTargetStore>,
    users: Arc<MemoryUserDirectory>,
}

impl TestApp {
    fn new() -> Self {
        let transport = Arc::new(RecordingTransport::default());
        let targets = Arc::new(MemoryTargetStore::new());
        let users = Arc::new(MemoryUserDirectory::new());

        let notifier = PushNotifier::new(transport.clone(), targets.clone());
        let processor = EventProcessor::new(
            Arc::new(MemoryAchievementStore::new(default_catalog())),
            Arc::new(MemoryStreakStore::new()),
            Arc::new(notifier),
        );
        let state = AppState::new(test_config(), processor, targets.clone(), users.clone());

        Self {
            state,
            transport,
            targets,
            users,
        }
    }

    /// Create a user and return a JWT for them.
    fn user(&self, username: &str) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        self.users.insert(user_id, username);

        let config = test_config();
        let token = rally_api::middleware::auth::encode_jwt(
            user_id,
            &config.jwt_secret,
            config.jwt_expiry_hours,
        )
        .unwrap();

        (user_id, token)
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        jwt: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(jwt) = jwt {
            builder = builder.header("authorization", format!("Bearer {}", jwt));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = create_router(self.state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

// ============================================================
// Health
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();

    let (status, json) = app.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "rally-api");
}

// ============================================================
// Device registration
// ============================================================

#[tokio::test]
async fn test_save_token_requires_auth() {
    let app = TestApp::new();

    let (status, _) = app
        .request(
            "POST",
            "/api/notifications/save-token",
            None,
            Some(serde_json::json!({"token": "device-a"})),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_save_token_missing_token_is_bad_request() {
    let app = TestApp::new();
    let (_, jwt) = app.user("alice");

    let (status, json) = app
        .request(
            "POST",
            "/api/notifications/save-token",
            Some(&jwt),
            Some(serde_json::json!({})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Token is required");
}

#[tokio::test]
async fn test_save_token_empty_body_is_bad_request() {
    let app = TestApp::new();
    let (_, jwt) = app.user("alice");

    // No body and no content type.
    let (status, json) = app
        .request("POST", "/api/notifications/save-token", Some(&jwt), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Token is required");
}

#[tokio::test]
async fn test_save_token_null_token_is_bad_request() {
    let app = TestApp::new();
    let (_, jwt) = app.user("alice");

    let (status, json) = app
        .request(
            "POST",
            "/api/notifications/save-token",
            Some(&jwt),
            Some(serde_json::json!({"token": null})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Token is required");
}

#[tokio::test]
async fn test_save_token_created_then_repeated() {
    let app = TestApp::new();
    let (alice, jwt) = app.user("alice");

    let (status, json) = app
        .request(
            "POST",
            "/api/notifications/save-token",
            Some(&jwt),
            Some(serde_json::json!({"token": "device-a"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "Token saved");
    assert_eq!(json["created"], true);

    let (status, json) = app
        .request(
            "POST",
            "/api/notifications/save-token",
            Some(&jwt),
            Some(serde_json::json!({"token": "device-a"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["created"], false);

    assert_eq!(app.targets.tokens_for(alice).await.unwrap(), vec!["device-a"]);
}

#[tokio::test]
async fn test_token_moves_to_latest_user() {
    let app = TestApp::new();
    let (alice, alice_jwt) = app.user("alice");
    let (bob, bob_jwt) = app.user("bob");
    let (_, carol_jwt) = app.user("carol");

    for jwt in [&alice_jwt, &bob_jwt] {
        let (status, _) = app
            .request(
                "POST",
                "/api/notifications/save-token",
                Some(jwt),
                Some(serde_json::json!({"token": "shared-device"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    assert_eq!(app.targets.owner_of("shared-device"), Some(bob));

    // Alice no longer owns a device, so a chat to her reaches nobody.
    let (status, json) = app
        .request(
            "POST",
            "/api/notifications/chat",
            Some(&carol_jwt),
            Some(serde_json::json!({"receiver_id": alice, "message": "hi"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["delivered"], 0);

    let (_, json) = app
        .request(
            "POST",
            "/api/notifications/chat",
            Some(&carol_jwt),
            Some(serde_json::json!({"receiver_id": bob, "message": "hi"})),
        )
        .await;
    assert_eq!(json["delivered"], 1);
}

// ============================================================
// Chat
// ============================================================

#[tokio::test]
async fn test_chat_preview_truncated() {
    let app = TestApp::new();
    let (_, alice_jwt) = app.user("alice");
    let (bob, bob_jwt) = app.user("bob");

    app.request(
        "POST",
        "/api/notifications/save-token",
        Some(&bob_jwt),
        Some(serde_json::json!({"token": "bob-phone"})),
    )
    .await;

    let message = "x".repeat(150);
    let (status, json) = app
        .request(
            "POST",
            "/api/notifications/chat",
            Some(&alice_jwt),
            Some(serde_json::json!({"receiver_id": bob, "message": message})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["delivered"], 1);

    let sent = app.transport.sent();
    assert_eq!(sent.len(), 1);
    let (token, payload) = &sent[0];
    assert_eq!(token, "bob-phone");
    assert_eq!(payload.title, "New message from alice");
    assert_eq!(payload.body, format!("{}...", "x".repeat(97)));
}

#[tokio::test]
async fn test_chat_unknown_receiver_is_not_found() {
    let app = TestApp::new();
    let (_, jwt) = app.user("alice");

    let (status, _) = app
        .request(
            "POST",
            "/api/notifications/chat",
            Some(&jwt),
            Some(serde_json::json!({"receiver_id": Uuid::new_v4(), "message": "hi"})),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_blank_message_rejected() {
    let app = TestApp::new();
    let (_, jwt) = app.user("alice");
    let (bob, _) = app.user("bob");

    let (status, json) = app
        .request(
            "POST",
            "/api/notifications/chat",
            Some(&jwt),
            Some(serde_json::json!({"receiver_id": bob, "message": "   "})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Message is required");
}

// ============================================================
// Events
// ============================================================

#[tokio::test]
async fn test_game_stats_unlocks_once() {
    let app = TestApp::new();
    let (alice, jwt) = app.user("alice");

    app.request(
        "POST",
        "/api/notifications/save-token",
        Some(&jwt),
        Some(serde_json::json!({"token": "alice-phone"})),
    )
    .await;

    let (status, json) = app
        .request(
            "POST",
            "/api/events/game-stats",
            Some(&jwt),
            Some(serde_json::json!({"user_id": alice, "games_won": 12})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut tags: Vec<String> = json["unlocked"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["condition"]["tag"].as_str().unwrap().to_string())
        .collect();
    tags.sort();
    assert_eq!(tags, vec!["10_win", "5_win", "first_win"]);
    assert_eq!(app.transport.sent().len(), 3);

    let (status, json) = app
        .request(
            "POST",
            "/api/events/game-stats",
            Some(&jwt),
            Some(serde_json::json!({"user_id": alice, "games_won": 12})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["unlocked"].as_array().unwrap().is_empty());
    assert_eq!(app.transport.sent().len(), 3);
}

#[tokio::test]
async fn test_events_for_another_user_rejected() {
    let app = TestApp::new();
    let (_, jwt) = app.user("alice");
    let (bob, _) = app.user("bob");

    let (status, _) = app
        .request(
            "POST",
            "/api/events/game-stats",
            Some(&jwt),
            Some(serde_json::json!({"user_id": bob, "games_won": 3})),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_streak_event_unlocks_streak_achievement() {
    let app = TestApp::new();
    let (alice, jwt) = app.user("alice");

    let (status, json) = app
        .request(
            "POST",
            "/api/events/streak",
            Some(&jwt),
            Some(serde_json::json!({"user_id": alice, "daily_streak": 3})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let unlocked = json["unlocked"].as_array().unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0]["condition"]["tag"], "3_day_streak");
}

// ============================================================
// Rewards & achievements
// ============================================================

#[tokio::test]
async fn test_claim_reward_twice_same_day() {
    let app = TestApp::new();
    let (_, jwt) = app.user("alice");

    let (status, json) = app
        .request("POST", "/api/rewards/claim", Some(&jwt), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["daily_streak"], 1);
    assert_eq!(json["max_streak"], 1);
    assert_eq!(json["claimed"], true);

    let (status, json) = app
        .request("POST", "/api/rewards/claim", Some(&jwt), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["daily_streak"], 1);
    assert_eq!(json["claimed"], false);

    let (status, json) = app
        .request("GET", "/api/rewards/streak", Some(&jwt), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["daily_streak"], 1);
}

#[tokio::test]
async fn test_achievements_listing_marks_unlocks() {
    let app = TestApp::new();
    let (alice, jwt) = app.user("alice");

    app.request(
        "POST",
        "/api/events/game-stats",
        Some(&jwt),
        Some(serde_json::json!({"user_id": alice, "games_won": 1})),
    )
    .await;

    let (status, json) = app
        .request("GET", "/api/achievements", Some(&jwt), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let list = json.as_array().unwrap();
    assert_eq!(list.len(), default_catalog().len());

    let first_win = list
        .iter()
        .find(|a| a["condition"]["tag"] == "first_win")
        .unwrap();
    assert_eq!(first_win["unlocked"], true);
    assert!(first_win["unlocked_at"].is_string());

    let five_win = list
        .iter()
        .find(|a| a["condition"]["tag"] == "5_win")
        .unwrap();
    assert_eq!(five_win["unlocked"], false);
}

#[tokio::test]
async fn test_invalid_jwt_rejected() {
    let app = TestApp::new();

    let (status, json) = app
        .request("GET", "/api/achievements", Some("not-a-jwt"), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().unwrap().contains("Invalid token"));
}
