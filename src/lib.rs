// Library crate for the kSoccer league backend
// This file exposes the public API for integration tests

pub mod app;
pub mod config;
pub mod db;
pub mod matches;
pub mod session;
pub mod shared;
pub mod stats;
pub mod user;

// Re-export commonly used types for easier access in tests
pub use app::{in_memory_state, router};
pub use config::AppConfig;
pub use db::InMemoryDatabase;
pub use shared::{AppError, AppState};
