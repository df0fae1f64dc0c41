//! Decision logic: streaks, achievement unlocks and notification composition.

pub mod achievements;
pub mod catalog;
pub mod composer;
pub mod processor;
pub mod streak;
