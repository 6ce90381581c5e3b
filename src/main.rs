use ksoccer::{app, config::AppConfig, db};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ksoccer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kSoccer backend");

    let config = AppConfig::from_env();
    if config.uses_default_jwt_secret() {
        warn!("JWT_SECRET not set, signing sessions with the built-in default secret");
    }
    if config.basic_tokens.is_empty() {
        warn!("BASIC_TOKENS is empty, all server-to-server calls will be refused");
    }

    let app_state = match &config.database_url {
        Some(database_url) => {
            let pool = db::connect_postgres(database_url).await?;
            app::postgres_state(&config, pool)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory storage");
            app::in_memory_state(&config, Arc::new(db::InMemoryDatabase::new()))
        }
    };

    let app = app::router(app_state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on http://{}", addr);

    // Connect info feeds the per-client login rate limit
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
