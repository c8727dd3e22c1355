//! Bounded retry with a constant delay between attempts.
//!
//! # Design
//! The retry predicate sees the whole attempt outcome (`&Result<T, E>`), so a
//! single config can retry on transport errors *and* on responses such as a
//! 503. The delay is constant; callers that want backoff build a new config
//! with a longer delay for the next call.
//!
//! Every wait is a `tokio` sleep. Dropping the future returned by
//! `RetryPolicy::run` abandons the in-flight attempt and the pending timer
//! together. A `CancellationToken` does the same from the outside and reports
//! `RetryError::Cancelled`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{LastOutcome, RetryError, TransportError};
use crate::http::NormalizedResponse;

type RetryPredicate<T, E> = Arc<dyn Fn(&Result<T, E>) -> bool + Send + Sync>;

/// How many times to try, how long to wait, and what counts as a failure.
pub struct RetryConfig<T, E> {
    max_attempts: u32,
    delay: Duration,
    predicate: Option<RetryPredicate<T, E>>,
}

impl<T, E> RetryConfig<T, E> {
    /// `max_attempts` below 1 is treated as 1. Errors are retried, successful
    /// values are not.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            predicate: None,
        }
    }

    /// Replace the retry predicate. Returning `true` means "try again".
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Result<T, E>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_retryable(&self, outcome: &Result<T, E>) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(outcome),
            None => outcome.is_err(),
        }
    }
}

impl RetryConfig<NormalizedResponse, TransportError> {
    /// Retry on any transport error other than an invalid request, and on
    /// responses whose status is in `statuses`.
    pub fn for_responses<I>(max_attempts: u32, delay: Duration, statuses: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        let statuses: Vec<u16> = statuses.into_iter().collect();
        Self::new(max_attempts, delay).retry_if(move |outcome| match outcome {
            Ok(response) => statuses.contains(&response.status()),
            Err(TransportError::InvalidRequest(_)) | Err(TransportError::Cancelled) => false,
            Err(_) => true,
        })
    }
}

impl<T, E> Clone for RetryConfig<T, E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            delay: self.delay,
            predicate: self.predicate.clone(),
        }
    }
}

impl<T, E> fmt::Debug for RetryConfig<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("custom_predicate", &self.predicate.is_some())
            .finish()
    }
}

/// A call-scoped retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy<T, E> {
    config: RetryConfig<T, E>,
    cancel: Option<CancellationToken>,
}

impl<T, E> RetryPolicy<T, E> {
    pub fn new(config: RetryConfig<T, E>) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &RetryConfig<T, E> {
        &self.config
    }

    /// Run `action` until it succeeds, the predicate refuses to retry, the
    /// attempts run out, or the token is cancelled.
    pub async fn run<F, Fut>(&self, mut action: F) -> Result<T, RetryError<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;

        loop {
            if self.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: attempt - 1,
                });
            }

            let outcome = match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }
                    outcome = action() => outcome,
                },
                None => action().await,
            };

            if !self.config.is_retryable(&outcome) {
                return match outcome {
                    Ok(value) => {
                        debug!(attempt, "attempt succeeded");
                        Ok(value)
                    }
                    Err(error) => Err(RetryError::NonRetryable {
                        attempts: attempt,
                        error,
                    }),
                };
            }

            if attempt >= max_attempts {
                let last = match outcome {
                    Ok(value) => LastOutcome::Rejected(value),
                    Err(error) => LastOutcome::Error(error),
                };
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last,
                });
            }

            match &outcome {
                Ok(_) => warn!(attempt, max_attempts, "result rejected, retrying"),
                Err(err) => warn!(attempt, max_attempts, error = %err, "attempt failed, retrying"),
            }
            drop(outcome);

            self.pause(attempt).await?;
            attempt += 1;
        }
    }

    async fn pause(&self, attempts: u32) -> Result<(), RetryError<T, E>> {
        let delay = self.config.delay();
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(RetryError::Cancelled { attempts }),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Run `action` under `config` without a cancellation token.
pub async fn run_with_retry<T, E, F, Fut>(
    action: F,
    config: &RetryConfig<T, E>,
) -> Result<T, RetryError<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    RetryPolicy::new(config.clone()).run(action).await
}
