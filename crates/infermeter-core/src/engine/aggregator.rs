use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::results::{RequestOutcome, RunResult, ALL_REQUESTS_FAILED};

// ---------------------------------------------------------------------------
// LatencyStats
// ---------------------------------------------------------------------------

/// Latency distribution over the successful requests of a run (ms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LatencyStats {
    pub avg_latency_ms: f64,
    pub median_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
}

impl LatencyStats {
    /// Summarise `latencies`; `None` for an empty slice since mean and median
    /// are undefined there. Input order does not matter.
    pub fn from_latencies(latencies: &[f64]) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }
        let mut sorted = latencies.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        Some(Self {
            avg_latency_ms: sum / n as f64,
            median_latency_ms: median,
            p95_latency_ms: percentile(&sorted, 0.95),
            p99_latency_ms: percentile(&sorted, 0.99),
            min_latency_ms: sorted[0],
            max_latency_ms: sorted[n - 1],
        })
    }
}

/// Smallest sample count at which quantile `q` is resolvable: 20 for p95,
/// 100 for p99.
pub fn min_samples_for(q: f64) -> usize {
    (1.0 / (1.0 - q)).round() as usize
}

/// Nearest-rank percentile of an ascending slice.
///
/// Returns the value at one-indexed rank `ceil(q * n)`. When `n` is below
/// [`min_samples_for`]`(q)` the percentile cannot be told apart from the tail,
/// so the maximum is returned instead. Returns 0.0 for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n < min_samples_for(q) {
        return sorted[n - 1];
    }
    let rank = (q * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

// ---------------------------------------------------------------------------
// ProgressSnapshot
// ---------------------------------------------------------------------------

/// Lightweight counters for progress events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub successful: u64,
    pub failed: u64,
}

// ---------------------------------------------------------------------------
// OutcomeAggregator
// ---------------------------------------------------------------------------

/// Upper bound on the latency buffer reserved up front.
pub const MAX_PREALLOCATED_LATENCIES: usize = 1 << 16;

/// Reduces request outcomes of one run into a [`RunResult`].
///
/// Owned by a single aggregation loop that drains the workers' channel, so
/// it needs no locking and never depends on completion order.
#[derive(Debug, Default)]
pub struct OutcomeAggregator {
    successful: u64,
    failed: u64,
    /// Latencies of successful requests only.
    latencies: Vec<f64>,
    errors: BTreeMap<String, u64>,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for `expected` outcomes, up to [`MAX_PREALLOCATED_LATENCIES`];
    /// larger runs grow the buffer as results arrive.
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            latencies: Vec::with_capacity(expected.min(MAX_PREALLOCATED_LATENCIES)),
            ..Self::default()
        }
    }

    /// Record the outcome of a single completed request.
    pub fn record(&mut self, outcome: &RequestOutcome) {
        if outcome.success {
            self.successful += 1;
            self.latencies.push(outcome.latency_ms);
        } else {
            self.failed += 1;
            let key = outcome
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            *self.errors.entry(key).or_insert(0) += 1;
        }
    }

    pub fn completed(&self) -> u64 {
        self.successful + self.failed
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed(),
            successful: self.successful,
            failed: self.failed,
        }
    }

    /// Build the final [`RunResult`] for a run that took `elapsed`.
    ///
    /// When nothing succeeded the latency block is omitted and the run carries
    /// [`ALL_REQUESTS_FAILED`] rather than statistics over an empty set.
    pub fn finish(self, elapsed: Duration) -> RunResult {
        let total = self.completed();
        let total_time_sec = elapsed.as_secs_f64();
        let success_rate_percent = if total > 0 {
            self.successful as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let requests_per_sec = if total_time_sec > 0.0 {
            self.successful as f64 / total_time_sec
        } else {
            0.0
        };
        let latency = LatencyStats::from_latencies(&self.latencies);
        let error = latency.is_none().then(|| ALL_REQUESTS_FAILED.to_string());

        RunResult {
            total_requests: total,
            successful_requests: self.successful,
            failed_requests: self.failed,
            success_rate_percent,
            total_time_sec,
            requests_per_sec,
            latency,
            errors: self.errors,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
