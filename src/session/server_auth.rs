use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashSet;

use super::types::ServerCaller;

/// Static set of `username:password` pairs trusted for server-to-server calls
#[derive(Debug, Clone, Default)]
pub struct ServerCredentials {
    tokens: HashSet<String>,
}

impl ServerCredentials {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Resolves an `Authorization` header value to the calling server
    pub fn authenticate(&self, auth_header: Option<&str>) -> Option<ServerCaller> {
        let token = decode_basic_token(auth_header?)?;
        if !self.tokens.contains(&token) {
            return None;
        }

        let (username, _) = token.split_once(':')?;
        Some(ServerCaller {
            username: username.to_string(),
        })
    }
}

/// Decodes `Basic <base64>` into `username:password`
fn decode_basic_token(auth_header: &str) -> Option<String> {
    let (scheme, encoded) = auth_header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let token = String::from_utf8(decoded).ok()?;
    token.contains(':').then_some(token)
}
