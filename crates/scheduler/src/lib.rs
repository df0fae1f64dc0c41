//! Rally scheduler: periodic daily-reminder fan-out.
//!
//! A pass lists every user and pushes the daily reminder to each. A failed
//! pass is retried as a whole under [`retry::RetryPolicy`]; a Redis
//! [`lease::RunLease`] keeps replicas from running the same pass twice.

pub mod lease;
pub mod reminder;
pub mod retry;
pub mod runner;
