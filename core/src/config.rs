//! Client configuration.
//!
//! Read from the environment so the same binary can point at a local mock
//! server or a deployed service:
//! - `TODO_API_URL`: service base URL (default `http://localhost:8081`)
//! - `TODO_API_TIMEOUT_SECS`: per-request timeout in seconds (default 10)

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("TODO_API_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup("TODO_API_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %raw, "ignoring invalid TODO_API_TIMEOUT_SECS"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn reads_url_and_timeout() {
        let config = ClientConfig::from_lookup(|key| match key {
            "TODO_API_URL" => Some("http://todo.internal:9000/".to_string()),
            "TODO_API_TIMEOUT_SECS" => Some("3".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "http://todo.internal:9000/");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn invalid_timeout_keeps_default() {
        let config = ClientConfig::from_lookup(|key| match key {
            "TODO_API_TIMEOUT_SECS" => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
