use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Tracked clients before a failure sweeps out every expired entry
const PRUNE_AT: usize = 1024;

/// Counts failed logins per client within a sliding window
pub struct LoginRateLimiter {
    config: RateLimitConfig,
    failures: Mutex<HashMap<String, Vec<Instant>>>,
}

impl LoginRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// True once the client has used up its failed attempts for the window
    pub async fn is_limited(&self, client: &str) -> bool {
        let mut failures = self.failures.lock().await;
        let Some(attempts) = failures.get_mut(client) else {
            return false;
        };

        let window = self.config.window;
        attempts.retain(|at| at.elapsed() < window);
        if attempts.is_empty() {
            failures.remove(client);
            return false;
        }

        let limited = attempts.len() >= self.config.max_failures as usize;
        if limited {
            warn!(client = %client, failures = attempts.len(), "Login rate limit reached");
        }
        limited
    }

    pub async fn record_failure(&self, client: &str) {
        let window = self.config.window;
        let mut failures = self.failures.lock().await;

        if failures.len() >= PRUNE_AT && !failures.contains_key(client) {
            let before = failures.len();
            failures.retain(|_, attempts| {
                attempts.retain(|at| at.elapsed() < window);
                !attempts.is_empty()
            });
            debug!(evicted = before - failures.len(), "Pruned expired login failures");
        }

        let attempts = failures.entry(client.to_string()).or_default();
        attempts.retain(|at| at.elapsed() < window);
        attempts.push(Instant::now());
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.failures.lock().await.len()
    }
}
