use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use ksoccer::{config::RateLimitConfig, in_memory_state, router, AppConfig, InMemoryDatabase};

/// Basic-auth pair accepted by every test application
pub const SERVER_TOKEN: &str = "script1:secret";

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app: Router,
    pub database: Arc<InMemoryDatabase>,
}

pub struct TestSetupBuilder {
    config: AppConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig {
                basic_tokens: vec![SERVER_TOKEN.to_string(), "debug:token".to_string()],
                ..AppConfig::default()
            },
        }
    }

    #[allow(dead_code)]
    pub fn with_login_limit(mut self, max_failures: u32) -> Self {
        self.config.login_rate_limit = RateLimitConfig {
            max_failures,
            window: Duration::from_secs(60),
        };
        self
    }

    pub fn build(self) -> TestSetup {
        let database = Arc::new(InMemoryDatabase::new());
        let app = router(in_memory_state(&self.config, database.clone()));
        TestSetup { app, database }
    }
}
