//! Wait for server-side state to converge.
//!
//! # Design
//! The predicate is evaluated immediately, then again after each
//! `poll_interval` until it returns `true` or the deadline passes. The last
//! sleep is shortened so the poller never overshoots the deadline by more
//! than one evaluation. A predicate that errors counts as "not yet"; its most
//! recent error is attached to the timeout for diagnostics. Each evaluation is
//! itself bounded by the deadline, so a hanging predicate cannot stall the
//! loop past `timeout`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::PollError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    timeout: Duration,
    poll_interval: Duration,
}

impl PollConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// How a successful wait went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub evaluations: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ConditionPoller {
    config: PollConfig,
    cancel: Option<CancellationToken>,
}

impl ConditionPoller {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn until<F, Fut, E>(&self, mut predicate: F) -> Result<PollReport, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: fmt::Display,
    {
        let start = Instant::now();
        let deadline = start + self.config.timeout;
        let mut evaluations = 0;
        let mut last_error = None;

        loop {
            evaluations += 1;
            let evaluation = timeout_at(deadline, predicate());
            let outcome = match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(PollError::Cancelled { elapsed: start.elapsed() });
                    }
                    outcome = evaluation => outcome,
                },
                None => evaluation.await,
            };

            match outcome {
                Ok(Ok(true)) => {
                    return Ok(PollReport {
                        evaluations,
                        elapsed: start.elapsed(),
                    });
                }
                Ok(Ok(false)) => {}
                Ok(Err(err)) => {
                    debug!(evaluations, error = %err, "predicate failed, still waiting");
                    last_error = Some(err.to_string());
                }
                Err(_) => {
                    last_error = Some("predicate still pending at deadline".to_string());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PollError::Timeout {
                    elapsed: now - start,
                    evaluations,
                    last_error,
                });
            }

            let pause = self.config.poll_interval.min(deadline - now);
            match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(PollError::Cancelled { elapsed: start.elapsed() });
                    }
                    _ = sleep(pause) => {}
                },
                None => sleep(pause).await,
            }
        }
    }
}

/// Poll `predicate` under `config` without a cancellation token.
pub async fn poll_until<F, Fut, E>(config: &PollConfig, predicate: F) -> Result<PollReport, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: fmt::Display,
{
    ConditionPoller::new(*config).until(predicate).await
}
