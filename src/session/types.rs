use serde::{Deserialize, Serialize};

/// JWT claims structure identifying a logged-in account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub account_id: i64,
    pub username: String, // Account handle
    pub exp: usize,       // Expiration timestamp (standard JWT claim)
    pub iat: usize,       // Issued at timestamp (standard JWT claim)
}

/// Authenticated server-to-server caller, taken from the basic-auth pair
#[derive(Debug, Clone, PartialEq)]
pub struct ServerCaller {
    pub username: String,
}
