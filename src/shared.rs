use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::matches::MatchRecorder;
use crate::session::{LoginRateLimiter, ServerCredentials, TokenConfig};
use crate::stats::StatLedger;
use crate::user::AccountDirectory;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountDirectory>,
    pub stat_ledger: Arc<StatLedger>,
    pub match_recorder: Arc<MatchRecorder>,
    pub server_credentials: Arc<ServerCredentials>,
    pub token_config: TokenConfig,
    pub login_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    pub fn new(
        accounts: Arc<AccountDirectory>,
        stat_ledger: Arc<StatLedger>,
        match_recorder: Arc<MatchRecorder>,
        server_credentials: Arc<ServerCredentials>,
        token_config: TokenConfig,
        login_limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self {
            accounts,
            stat_ledger,
            match_recorder,
            server_credentials,
            token_config,
            login_limiter,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing identifier: {0}")]
    MissingIdentifier(String),

    #[error("Invalid name format: {0}")]
    InvalidNameFormat(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown stat kind: {0}")]
    UnknownStatKind(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Server-to-server credential missing or rejected
    #[error("Invalid username or password")]
    BasicAuthDenied,

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    Internal,
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

/// Unreadable or mistyped request bodies surface as `Validation` (400)
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = match &self {
            AppError::MissingIdentifier(_)
            | AppError::InvalidNameFormat(_)
            | AppError::Validation(_)
            | AppError::UnknownStatKind(_) => StatusCode::BAD_REQUEST,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) | AppError::BasicAuthDenied | AppError::JwtError(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::DatabaseError(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": message
        }));

        if matches!(self, AppError::BasicAuthDenied) {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"Users\"")],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::config::{AppConfig, RateLimitConfig};
    use crate::db::InMemoryDatabase;
    use std::time::Duration;

    pub const TEST_BASIC_TOKEN: &str = "script1:secret";

    /// Builder for creating AppState backed by one in-memory database
    pub struct AppStateBuilder {
        database: Arc<InMemoryDatabase>,
        config: AppConfig,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            let config = AppConfig {
                basic_tokens: vec![TEST_BASIC_TOKEN.to_string()],
                ..AppConfig::default()
            };
            Self {
                database: Arc::new(InMemoryDatabase::new()),
                config,
            }
        }

        pub fn with_database(mut self, database: Arc<InMemoryDatabase>) -> Self {
            self.database = database;
            self
        }

        pub fn with_login_limit(mut self, max_failures: u32) -> Self {
            self.config.login_rate_limit = RateLimitConfig {
                max_failures,
                window: Duration::from_secs(60),
            };
            self
        }

        pub fn build(self) -> AppState {
            crate::app::in_memory_state(&self.config, self.database)
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    pub fn basic_auth_header(token: &str) -> String {
        use base64::Engine;
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(token)
        )
    }
}
