//! Client configuration

use crate::transport::DEFAULT_MAX_RETRIES;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_HOST: &str = "http://localhost:3001/api";
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

const ENV_API_HOST: &str = "ANSWER_STREAM_API_HOST";
const ENV_MAX_RETRIES: &str = "ANSWER_STREAM_MAX_RETRIES";
const ENV_RETRY_INTERVAL_MS: &str = "ANSWER_STREAM_RETRY_INTERVAL_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("invalid API host {0:?}")]
    InvalidUrl(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Where to reach the chat backend and how patient to be with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL; the chat endpoint is `{api_host}/chat`
    pub api_host: String,
    /// Retriable failures tolerated per turn
    pub max_retries: u32,
    /// Delay before the transport reconnects after a failure
    pub retry_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_API_HOST).filter(|h| !h.trim().is_empty()) {
            config.api_host = host;
        }
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            config.max_retries = parse_number(ENV_MAX_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RETRY_INTERVAL_MS) {
            config.retry_interval = Duration::from_millis(parse_number(ENV_RETRY_INTERVAL_MS, &raw)?);
        }

        config.chat_endpoint()?;
        Ok(config)
    }

    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = host.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn chat_endpoint(&self) -> Result<Url, ConfigError> {
        let raw = format!("{}/chat", self.api_host.trim_end_matches('/'));
        Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(self.api_host.clone()))
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(
            config.chat_endpoint().unwrap().as_str(),
            "http://localhost:3001/api/chat"
        );
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("ANSWER_STREAM_API_HOST", "https://search.example.com/api/"),
            ("ANSWER_STREAM_MAX_RETRIES", "5"),
            ("ANSWER_STREAM_RETRY_INTERVAL_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert_eq!(
            config.chat_endpoint().unwrap().as_str(),
            "https://search.example.com/api/chat"
        );
    }

    #[test]
    fn rejects_bad_numbers_and_hosts() {
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("ANSWER_STREAM_MAX_RETRIES", "three")])),
            Err(ConfigError::InvalidNumber {
                var: "ANSWER_STREAM_MAX_RETRIES",
                value: "three".to_string()
            })
        );
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("ANSWER_STREAM_API_HOST", "not a url")])),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
