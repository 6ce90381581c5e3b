use std::time::Duration;

/// Session signing secret used when `JWT_SECRET` is unset
pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";

/// Failed-login throttling, handed to the login rate limiter at construction
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub max_failures: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // 10 failed attempts per 30 minutes
        Self {
            max_failures: 10,
            window: Duration::from_secs(30 * 60),
        }
    }
}

/// Runtime configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    /// Accepted `username:password` pairs for server-to-server calls
    pub basic_tokens: Vec<String>,
    pub jwt_secret: String,
    pub session_expiration_days: i64,
    pub login_rate_limit: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: "0.0.0.0:3000".to_string(),
            basic_tokens: Vec::new(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            session_expiration_days: 365,
            login_rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let basic_tokens = non_empty("BASIC_TOKENS")
            .map(|raw| parse_basic_tokens(&raw))
            .unwrap_or_default();

        let login_rate_limit = RateLimitConfig {
            max_failures: non_empty("LOGIN_RATE_LIMIT_ATTEMPTS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.login_rate_limit.max_failures),
            window: non_empty("LOGIN_RATE_LIMIT_WINDOW_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.login_rate_limit.window),
        };

        Self {
            database_url: non_empty("DATABASE_URL"),
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            basic_tokens,
            jwt_secret: non_empty("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            session_expiration_days: non_empty("SESSION_EXPIRATION_DAYS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.session_expiration_days),
            login_rate_limit,
        }
    }

    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Splits a comma separated list, dropping entries without a `:` separator
fn parse_basic_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| token.contains(':'))
        .map(str::to_string)
        .collect()
}
