use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::db::InMemoryDatabase;
use crate::matches::{self, InMemoryMatchRepository, MatchRecorder, PostgresMatchRepository};
use crate::session::{self, LoginRateLimiter, ServerCredentials, TokenConfig};
use crate::shared::AppState;
use crate::stats::{self, InMemoryStatRepository, PostgresStatRepository, StatLedger};
use crate::user::{
    self, AccountDirectory, AccountRepository, InMemoryAccountRepository,
    PostgresAccountRepository,
};

fn assemble(
    config: &AppConfig,
    account_repository: Arc<dyn AccountRepository>,
    stat_repository: Arc<dyn stats::StatRepository>,
    match_repository: Arc<dyn matches::MatchRepository>,
) -> AppState {
    let accounts = Arc::new(AccountDirectory::new(account_repository));

    AppState::new(
        accounts.clone(),
        Arc::new(StatLedger::new(accounts.clone(), stat_repository)),
        Arc::new(MatchRecorder::new(accounts, match_repository)),
        Arc::new(ServerCredentials::new(config.basic_tokens.clone())),
        TokenConfig::from_config(config),
        Arc::new(LoginRateLimiter::new(config.login_rate_limit.clone())),
    )
}

/// State whose repositories all share one in-memory table set
pub fn in_memory_state(config: &AppConfig, database: Arc<InMemoryDatabase>) -> AppState {
    assemble(
        config,
        Arc::new(InMemoryAccountRepository::new(database.clone())),
        Arc::new(InMemoryStatRepository::new(database.clone())),
        Arc::new(InMemoryMatchRepository::new(database)),
    )
}

pub fn postgres_state(config: &AppConfig, pool: PgPool) -> AppState {
    assemble(
        config,
        Arc::new(PostgresAccountRepository::new(pool.clone())),
        Arc::new(PostgresStatRepository::new(pool.clone())),
        Arc::new(PostgresMatchRepository::new(pool)),
    )
}

async fn health() -> &'static str {
    "ok"
}

/// Full application router
pub fn router(state: AppState) -> Router {
    let server_routes = Router::new()
        .route("/soccer/stats", post(stats::handlers::create_stat))
        .route("/soccer/matches", post(matches::handlers::create_match))
        .route(
            "/users/reset-password",
            post(user::handlers::reset_password),
        )
        .route("/users/test-accounts", get(user::handlers::test_accounts))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::server_basic_auth,
        ));

    let session_routes = Router::new()
        .route(
            "/users/me",
            get(user::handlers::current_account).patch(user::handlers::update_current_account),
        )
        .route(
            "/users/change-password",
            post(user::handlers::change_password),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_auth,
        ));

    let public_routes = Router::new()
        .route("/users/login", post(user::handlers::login))
        .route("/users/search", get(user::handlers::search_accounts))
        .route("/users/marketplace", get(user::handlers::marketplace))
        .route("/users/:handle", get(user::handlers::account_profile));

    let api = server_routes.merge(session_routes).merge(public_routes);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
