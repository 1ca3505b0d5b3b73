use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Every interval and timeout the client uses, in one injected policy
/// object. Call sites never carry their own literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    /// Regular session-status poll interval.
    pub status_poll_ms: u64,
    /// Faster interval for price-only polling surfaces.
    pub quick_poll_ms: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_ms: u64,
    /// Delay before the single token-sync retry.
    pub token_retry_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            status_poll_ms: 5000,
            quick_poll_ms: 3000,
            request_timeout_ms: 5000,
            token_retry_ms: 5000,
        }
    }
}

impl Timing {
    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }

    pub fn quick_poll(&self) -> Duration {
        Duration::from_millis(self.quick_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn token_retry(&self) -> Duration {
        Duration::from_millis(self.token_retry_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL, no trailing slash.
    pub api_base_url: String,
    /// Path of the JSON preference file (identity, last-used config).
    pub prefs_path: String,
    pub timing: Timing,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let env_ms = |key: &str, default: u64| -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let defaults = Timing::default();
        Config {
            api_base_url: env("AXON_API_URL", "http://localhost:8000"),
            prefs_path: env("AXON_PREFS_PATH", "axon_prefs.json"),
            timing: Timing {
                status_poll_ms: env_ms("AXON_STATUS_POLL_MS", defaults.status_poll_ms),
                quick_poll_ms: env_ms("AXON_QUICK_POLL_MS", defaults.quick_poll_ms),
                request_timeout_ms: env_ms("AXON_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
                token_retry_ms: env_ms("AXON_TOKEN_RETRY_MS", defaults.token_retry_ms),
            },
            log_level: env("AXON_LOG_LEVEL", "INFO"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_matches_source_constants() {
        let t = Timing::default();
        assert_eq!(t.status_poll(), Duration::from_millis(5000));
        assert_eq!(t.quick_poll(), Duration::from_millis(3000));
        assert_eq!(t.token_retry(), Duration::from_millis(5000));
    }
}
