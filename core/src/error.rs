//! Error types for the orchestration core.
//!
//! # Design
//! Each concern gets its own error type so callers can match on exactly the
//! failures an operation can produce. Transport and timeout failures are
//! surfaced unchanged; business-rule mismatches (wrong status, missing key)
//! are never errors and live in `validate::ValidationResult` instead.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failures below the HTTP layer. A non-2xx status is *not* a transport
/// error; it arrives as a regular `NormalizedResponse`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established (refused, DNS, TLS).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport gave up waiting for the server.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The request could not be built from its `RequestSpec`.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be read off the wire.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The peer answered with something that is not a valid HTTP status.
    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    /// The caller cancelled the request while it was in flight.
    #[error("request cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Other(String),
}

/// The body of a response is not valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response body is not valid JSON (line {line}, column {column}): {message}")]
pub struct BodyParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<serde_json::Error> for BodyParseError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }
}

/// The last thing a retried action produced before the retry loop gave up.
#[derive(Debug)]
pub enum LastOutcome<T, E> {
    /// The action failed.
    Error(E),
    /// The action succeeded, but the retry predicate rejected the value
    /// (e.g. a 503 response).
    Rejected(T),
}

impl<T, E> LastOutcome<T, E> {
    pub fn error(&self) -> Option<&E> {
        match self {
            LastOutcome::Error(err) => Some(err),
            LastOutcome::Rejected(_) => None,
        }
    }

    pub fn rejected(&self) -> Option<&T> {
        match self {
            LastOutcome::Error(_) => None,
            LastOutcome::Rejected(value) => Some(value),
        }
    }
}

/// Errors returned by `retry::RetryPolicy`.
#[derive(Debug)]
pub enum RetryError<T, E> {
    /// Every configured attempt failed or was rejected.
    Exhausted { attempts: u32, last: LastOutcome<T, E> },

    /// The action failed with an error the retry predicate refused to retry.
    NonRetryable { attempts: u32, error: E },

    /// The cancellation token fired; no further attempt was started.
    Cancelled { attempts: u32 },
}

impl<T, E> RetryError<T, E> {
    /// Number of attempts started before the loop stopped.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::NonRetryable { attempts, .. }
            | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

impl<T, E: fmt::Display> fmt::Display for RetryError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last: LastOutcome::Error(err) } => {
                write!(f, "retries exhausted after {attempts} attempt(s): {err}")
            }
            RetryError::Exhausted { attempts, last: LastOutcome::Rejected(_) } => {
                write!(f, "retries exhausted after {attempts} attempt(s): last result was rejected")
            }
            RetryError::NonRetryable { attempts, error } => {
                write!(f, "non-retryable failure on attempt {attempts}: {error}")
            }
            RetryError::Cancelled { attempts } => {
                write!(f, "retry cancelled after {attempts} attempt(s)")
            }
        }
    }
}

impl<T, E> std::error::Error for RetryError<T, E>
where
    T: fmt::Debug,
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Exhausted { last: LastOutcome::Error(err), .. } => Some(err),
            RetryError::NonRetryable { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Errors returned by `poll::ConditionPoller`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// The predicate never returned `true` before the deadline.
    #[error("condition not met after {elapsed:?} ({evaluations} evaluation(s)){}", last_error_suffix(.last_error))]
    Timeout {
        elapsed: Duration,
        evaluations: u32,
        /// Most recent error raised by the predicate, if any.
        last_error: Option<String>,
    },

    #[error("polling cancelled after {elapsed:?}")]
    Cancelled { elapsed: Duration },
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(err) => format!("; last predicate error: {err}"),
        None => String::new(),
    }
}

/// Statistics were requested over zero timing samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot summarize an empty sample set")]
pub struct EmptySampleSetError;

/// Internal failure of the response validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required keys were requested but the body is not JSON.
    #[error("required keys cannot be checked: {0}")]
    UnparseableBody(#[from] BodyParseError),
}

/// Bad configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got `{value}`")]
    InvalidNumber { key: String, value: String },

    #[error("{key} must be at least {min}, got {value}")]
    OutOfRange { key: String, value: u64, min: u64 },
}
