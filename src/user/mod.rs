pub mod credentials;
pub mod handlers;
pub mod models;
pub mod names;
pub mod repository;
pub mod service;
pub mod types;

pub use models::AccountModel;
pub use repository::{AccountRepository, InMemoryAccountRepository, PostgresAccountRepository};
pub use service::AccountDirectory;
