// Public API - what other modules can use
pub use middleware::{server_basic_auth, session_auth};
pub use rate_limit::LoginRateLimiter;
pub use server_auth::ServerCredentials;
pub use token::TokenConfig;
pub use types::{ServerCaller, SessionClaims};

// Internal modules
mod middleware;
mod rate_limit;
mod server_auth;
mod token;
mod types;
