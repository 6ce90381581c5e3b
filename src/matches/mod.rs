pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;

pub use models::{MatchModel, ParticipationModel, Side};
pub use repository::{InMemoryMatchRepository, MatchRepository, PostgresMatchRepository};
pub use service::{MatchRecorder, MatchSubmission};
