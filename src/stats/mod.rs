pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;

pub use models::{StatEvent, StatKind};
pub use repository::{InMemoryStatRepository, PostgresStatRepository, StatRepository};
pub use service::{StatLedger, StatSubmission};
