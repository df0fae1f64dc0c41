pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod redis_pool;
pub mod types;
