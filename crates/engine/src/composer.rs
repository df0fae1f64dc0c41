//! Notification composer: turns a notification kind plus its fields into
//! the title, body and data map that get pushed to devices.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use rally_common::error::AppError;
use rally_common::types::{Achievement, NotificationKind, NotificationPayload, StreakState};

/// Chat bodies at or above this many characters get truncated.
const CHAT_BODY_LIMIT: usize = 100;
/// Characters of the message kept when truncating; the marker fills the rest.
const CHAT_PREVIEW_CHARS: usize = 97;
const ELLIPSIS: &str = "...";

/// Compose a notification from loosely typed event fields.
///
/// Required fields per kind:
/// - `achievement_unlocked`: `achievement_id`, `title`
/// - `streak_update`: `daily_streak`, `max_streak`
/// - `daily_reminder`: none
/// - `chat_message`: `sender_id`, `sender_name`, `message`
pub fn compose(kind: NotificationKind, payload: &Value) -> Result<NotificationPayload, AppError> {
    match kind {
        NotificationKind::AchievementUnlocked => Ok(achievement_unlocked(
            required_str(payload, kind, "achievement_id")?,
            required_str(payload, kind, "title")?,
        )),
        NotificationKind::StreakUpdate => Ok(streak_update(
            required_u64(payload, kind, "daily_streak")?,
            required_u64(payload, kind, "max_streak")?,
        )),
        NotificationKind::DailyReminder => Ok(daily_reminder()),
        NotificationKind::ChatMessage => Ok(chat_message(
            required_str(payload, kind, "sender_id")?,
            required_str(payload, kind, "sender_name")?,
            required_str(payload, kind, "message")?,
        )),
    }
}

pub fn for_achievement(achievement: &Achievement) -> NotificationPayload {
    achievement_unlocked(&achievement.id.to_string(), &achievement.title)
}

pub fn for_streak(state: &StreakState) -> NotificationPayload {
    streak_update(u64::from(state.daily_streak), u64::from(state.max_streak))
}

pub fn for_chat(sender_id: Uuid, sender_name: &str, message: &str) -> NotificationPayload {
    chat_message(&sender_id.to_string(), sender_name, message)
}

pub fn daily_reminder() -> NotificationPayload {
    NotificationPayload {
        title: "☀️ Good Morning!".to_string(),
        body: "Have a great day! Don’t forget to follow your tasks today.".to_string(),
        data: data(&[("type", "daily_reminder")]),
    }
}

fn achievement_unlocked(achievement_id: &str, title: &str) -> NotificationPayload {
    NotificationPayload {
        title: "🏆 Achievement Unlocked!".to_string(),
        body: format!("You've unlocked the {} achievement!", title),
        data: data(&[("type", "achievement"), ("achievement_id", achievement_id)]),
    }
}

fn streak_update(daily_streak: u64, max_streak: u64) -> NotificationPayload {
    NotificationPayload {
        title: "🔥 Daily Streak!".to_string(),
        body: format!(
            "You've maintained a {}-day streak! Keep it up 💪",
            daily_streak
        ),
        data: data(&[
            ("type", "streak"),
            ("daily_streak", &daily_streak.to_string()),
            ("max_streak", &max_streak.to_string()),
        ]),
    }
}

fn chat_message(sender_id: &str, sender_name: &str, message: &str) -> NotificationPayload {
    NotificationPayload {
        title: format!("New message from {}", sender_name),
        body: chat_preview(message),
        data: data(&[
            ("type", "chat"),
            ("sender_id", sender_id),
            ("message", message),
        ]),
    }
}

/// Bound the chat body: 97 characters of content plus `...`.
fn chat_preview(message: &str) -> String {
    if message.chars().count() < CHAT_BODY_LIMIT {
        return message.to_string();
    }
    let mut preview: String = message.chars().take(CHAT_PREVIEW_CHARS).collect();
    preview.push_str(ELLIPSIS);
    preview
}

fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn required_str<'a>(
    payload: &'a Value,
    kind: NotificationKind,
    field: &str,
) -> Result<&'a str, AppError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| missing(kind, field))
}

fn required_u64(payload: &Value, kind: NotificationKind, field: &str) -> Result<u64, AppError> {
    payload
        .get(field)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| missing(kind, field))
}

fn missing(kind: NotificationKind, field: &str) -> AppError {
    AppError::Validation(format!("{} notification requires '{}'", kind, field))
}
