//! Summary statistics over timing samples.
//!
//! # Design
//! `summarize` takes an immutable slice, so a sample set is always owned by
//! one collector and handed over whole; concurrent tasks collect into their
//! own vectors and concatenate before summarizing.
//!
//! Median policy: for an even number of samples the LOWER of the two middle
//! values (after sorting ascending) is reported. `p95` uses the nearest-rank
//! rule. Sorting happens on a copy.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::EmptySampleSetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub median: Duration,
    pub p95: Duration,
    /// Sample standard deviation; zero for a single sample.
    pub std_dev: Duration,
}

pub fn summarize(samples: &[Duration]) -> Result<Summary, EmptySampleSetError> {
    if samples.is_empty() {
        return Err(EmptySampleSetError);
    }

    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let count = sorted.len();

    let total: u128 = sorted.iter().map(Duration::as_nanos).sum();
    let mean = nanos_to_duration(total / count as u128);

    let median = sorted[(count - 1) / 2];
    let p95_rank = (95 * count).div_ceil(100).max(1);
    let p95 = sorted[p95_rank - 1];

    Ok(Summary {
        count,
        min: sorted[0],
        max: sorted[count - 1],
        mean,
        median,
        p95,
        std_dev: std_dev(&sorted),
    })
}

fn nanos_to_duration(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}

fn std_dev(samples: &[Duration]) -> Duration {
    if samples.len() < 2 {
        return Duration::ZERO;
    }
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (i, sample) in samples.iter().enumerate() {
        let value = sample.as_secs_f64();
        let delta = value - mean;
        mean += delta / (i + 1) as f64;
        m2 += delta * (value - mean);
    }
    let variance = m2 / (samples.len() - 1) as f64;
    Duration::try_from_secs_f64(variance.sqrt()).unwrap_or(Duration::MAX)
}

/// Upper bounds a summary must stay under. Unset limits are not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerformanceBudget {
    pub max_mean: Option<Duration>,
    pub max_median: Option<Duration>,
    pub max_p95: Option<Duration>,
    pub max_single: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetBreach {
    pub metric: &'static str,
    pub limit: Duration,
    pub observed: Duration,
}

impl fmt::Display for BudgetBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} exceeds budget {:?}",
            self.metric, self.observed, self.limit
        )
    }
}

impl PerformanceBudget {
    pub fn check(&self, summary: &Summary) -> Vec<BudgetBreach> {
        [
            ("mean", self.max_mean, summary.mean),
            ("median", self.max_median, summary.median),
            ("p95", self.max_p95, summary.p95),
            ("max", self.max_single, summary.max),
        ]
        .into_iter()
        .filter_map(|(metric, limit, observed)| {
            let limit = limit?;
            (observed > limit).then_some(BudgetBreach {
                metric,
                limit,
                observed,
            })
        })
        .collect()
    }
}

/// Await `operation` and report how long it took.
pub async fn timed<Fut: Future>(operation: Fut) -> (Fut::Output, Duration) {
    let start = Instant::now();
    let output = operation.await;
    (output, start.elapsed())
}

/// Run `action` `iterations` times one after another and collect each
/// duration. The first error aborts the session.
pub async fn measure_sequential<F, Fut, T, E>(
    iterations: usize,
    mut action: F,
) -> Result<Vec<Duration>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let (outcome, elapsed) = timed(action()).await;
        outcome?;
        samples.push(elapsed);
    }
    Ok(samples)
}
