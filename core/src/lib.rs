//! Orchestration core for end-to-end API tests.
//!
//! # Overview
//! A test scenario builds a `RequestSpec`, runs it through a
//! `RequestExecutor` (optionally wrapped in a `RetryPolicy`), checks the
//! `NormalizedResponse` with `validate`, and may time repeated calls with
//! `metrics`. `ConditionPoller` waits for state the server updates
//! asynchronously.
//!
//! # Design
//! - Nothing here holds cross-call mutable state; session tokens travel in
//!   request headers, supplied by the caller.
//! - The HTTP engine and the log destination are traits (`Transport`,
//!   `ObservabilitySink`), so tests swap in scripted or recording versions.
//! - Contract mismatches are data (`ValidationResult::Invalid`); only
//!   transport, timeout and exhaustion failures are errors.
//! - Store service objects (`StoreEndpoints`) are plain spec builders.

pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod metrics;
pub mod observe;
pub mod poll;
pub mod retry;
pub mod store;
pub mod transport;
pub mod types;
pub mod validate;

pub use config::ProbeConfig;
pub use error::{
    BodyParseError, ConfigError, EmptySampleSetError, LastOutcome, PollError, RetryError,
    TransportError, ValidationError,
};
pub use executor::RequestExecutor;
pub use crate::http::{HttpMethod, NormalizedResponse, RequestSpec};
pub use metrics::{summarize, PerformanceBudget, Summary};
pub use observe::{MemorySink, NullSink, ObservabilitySink, Observation, TracingSink};
pub use poll::{poll_until, ConditionPoller, PollConfig, PollReport};
pub use retry::{run_with_retry, RetryConfig, RetryPolicy};
pub use store::StoreEndpoints;
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use types::{Cart, CartItem, Product, Session};
pub use validate::{validate, ValidationExpectation, ValidationResult, Violation};
