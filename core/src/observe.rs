//! Pluggable observability for the request executor.
//!
//! # Design
//! The executor reports what it sends and receives as `Observation` values
//! handed to an `ObservabilitySink`. Sinks must return quickly and must not
//! fail; `TracingSink` forwards to `tracing`, `NullSink` drops everything and
//! `MemorySink` keeps a copy for assertions in tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::http::HttpMethod;

/// Default number of body bytes included in an observation.
pub const DEFAULT_BODY_LIMIT: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Sending {
        request_id: Uuid,
        method: HttpMethod,
        url: String,
        body: String,
    },
    Received {
        request_id: Uuid,
        status: u16,
        elapsed: Duration,
        body: String,
    },
    Failed {
        request_id: Uuid,
        error: String,
    },
}

impl Observation {
    pub fn request_id(&self) -> Uuid {
        match self {
            Observation::Sending { request_id, .. }
            | Observation::Received { request_id, .. }
            | Observation::Failed { request_id, .. } => *request_id,
        }
    }
}

pub trait ObservabilitySink: Send + Sync {
    fn observe(&self, observation: &Observation);
}

/// Forwards observations to `tracing` as structured events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn observe(&self, observation: &Observation) {
        match observation {
            Observation::Sending {
                request_id,
                method,
                url,
                body,
            } => {
                info!(%request_id, %method, target = %url, body = %body, "sending request");
            }
            Observation::Received {
                request_id,
                status,
                elapsed,
                body,
            } => {
                info!(
                    %request_id,
                    status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    body = %body,
                    "received response"
                );
            }
            Observation::Failed { request_id, error } => {
                warn!(%request_id, error = %error, "request failed");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ObservabilitySink for NullSink {
    fn observe(&self, _observation: &Observation) {}
}

/// Records every observation in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Observation>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Observation> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ObservabilitySink for MemorySink {
    fn observe(&self, observation: &Observation) {
        self.events.lock().push(observation.clone());
    }
}

/// Render at most `limit` bytes of `body` as text, noting what was cut.
pub fn truncate_body(body: &[u8], limit: usize) -> String {
    if body.len() <= limit {
        return String::from_utf8_lossy(body).into_owned();
    }
    let head = String::from_utf8_lossy(&body[..limit]);
    format!("{head}... ({} more bytes)", body.len() - limit)
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`
/// (default `apiprobe_core=info`). Safe to call more than once.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apiprobe_core=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_body_is_kept_whole() {
        assert_eq!(truncate_body(b"hello", 10), "hello");
        assert_eq!(truncate_body(b"", 10), "");
    }

    #[test]
    fn long_body_is_cut_with_remainder_count() {
        let body = vec![b'a'; 20];
        assert_eq!(truncate_body(&body, 8), "aaaaaaaa... (12 more bytes)");
    }

    #[test]
    fn cut_inside_multibyte_char_does_not_panic() {
        let body = "héllo".as_bytes();
        let out = truncate_body(body, 2);
        assert!(out.starts_with('h'));
        assert!(out.ends_with("(4 more bytes)"));
    }

    #[test]
    fn memory_sink_clones_share_events() {
        let sink = MemorySink::new();
        let other = sink.clone();
        let id = Uuid::new_v4();
        other.observe(&Observation::Failed {
            request_id: id,
            error: "boom".to_string(),
        });
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].request_id(), id);
        sink.clear();
        assert!(other.events().is_empty());
    }

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
