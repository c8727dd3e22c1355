//! Harness configuration read from the environment.
//!
//! Every knob has a default so a bare `ProbeConfig::default()` works against
//! a mock store on `localhost:3000`.

use std::time::Duration;

use crate::error::ConfigError;
use crate::poll::PollConfig;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
    pub log_body_limit: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(10),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
            poll_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            log_body_limit: crate::observe::DEFAULT_BODY_LIMIT,
        }
    }
}

impl ProbeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; unset keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                Some(raw) => parse_u64(key, &raw).map(Duration::from_millis),
                None => Ok(default),
            }
        };

        let retry_attempts = match lookup("APIPROBE_RETRY_ATTEMPTS") {
            Some(raw) => {
                let value = parse_u64("APIPROBE_RETRY_ATTEMPTS", &raw)?;
                if value == 0 {
                    return Err(ConfigError::OutOfRange {
                        key: "APIPROBE_RETRY_ATTEMPTS".to_string(),
                        value,
                        min: 1,
                    });
                }
                u32::try_from(value).unwrap_or(u32::MAX)
            }
            None => defaults.retry_attempts,
        };

        let log_body_limit = match lookup("APIPROBE_LOG_BODY_LIMIT") {
            Some(raw) => parse_u64("APIPROBE_LOG_BODY_LIMIT", &raw)? as usize,
            None => defaults.log_body_limit,
        };

        Ok(Self {
            base_url: lookup("APIPROBE_BASE_URL").unwrap_or(defaults.base_url),
            request_timeout: millis("APIPROBE_TIMEOUT_MS", defaults.request_timeout)?,
            retry_attempts,
            retry_delay: millis("APIPROBE_RETRY_DELAY_MS", defaults.retry_delay)?,
            poll_timeout: millis("APIPROBE_POLL_TIMEOUT_MS", defaults.poll_timeout)?,
            poll_interval: millis("APIPROBE_POLL_INTERVAL_MS", defaults.poll_interval)?,
            log_body_limit,
        })
    }

    /// Retry settings with the default predicate: retry on errors only.
    pub fn retry_config<T, E>(&self) -> RetryConfig<T, E> {
        RetryConfig::new(self.retry_attempts, self.retry_delay)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(self.poll_timeout, self.poll_interval)
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
