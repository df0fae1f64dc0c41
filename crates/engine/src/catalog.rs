//! Built-in achievement catalog.
//!
//! The same rows are seeded by the initial migration; the ids match so the
//! in-memory store and Postgres agree.

use uuid::Uuid;

use rally_common::types::{Achievement, StatKind, UnlockCondition};

/// `(id, title, tag, stat, threshold)` for every built-in achievement.
const DEFAULT_CATALOG: &[(u128, &str, &str, StatKind, u32)] = &[
    (0x7d3c1a52_0b6e_4f1a_9b51_000000000001, "First Win", "first_win", StatKind::GamesWon, 1),
    (0x7d3c1a52_0b6e_4f1a_9b51_000000000005, "High Five", "5_win", StatKind::GamesWon, 5),
    (0x7d3c1a52_0b6e_4f1a_9b51_000000000010, "Perfect Ten", "10_win", StatKind::GamesWon, 10),
    (0x7d3c1a52_0b6e_4f1a_9b51_000000000025, "Quarter Century", "25_win", StatKind::GamesWon, 25),
    (0x7d3c1a52_0b6e_4f1a_9b51_000000000050, "Half Century", "50_win", StatKind::GamesWon, 50),
    (0x7d3c1a52_0b6e_4f1a_9b51_000000000100, "Centurion", "100_win", StatKind::GamesWon, 100),
    (0x7d3c1a52_0b6e_4f1a_9b51_000000000003, "On Fire", "3_day_streak", StatKind::DailyStreak, 3),
];

pub fn default_catalog() -> Vec<Achievement> {
    DEFAULT_CATALOG
        .iter()
        .map(|&(id, title, tag, stat, threshold)| Achievement {
            id: Uuid::from_u128(id),
            title: title.to_string(),
            condition: UnlockCondition::new(tag, stat, threshold),
        })
        .collect()
}
