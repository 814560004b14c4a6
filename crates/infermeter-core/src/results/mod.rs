pub mod compare;
pub mod export;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{BenchmarkConfig, LoadTestConfig, Target};
use crate::engine::aggregator::LatencyStats;

pub use compare::{compare_runs, compare_targets, Comparison, LatencyBasis};

/// Error recorded on a run in which no request succeeded.
pub const ALL_REQUESTS_FAILED: &str = "All requests failed";

// ---------------------------------------------------------------------------
// RequestOutcome
// ---------------------------------------------------------------------------

/// The result of a single prediction call. Produced by a worker, consumed by
/// the aggregator, never mutated in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequestOutcome {
    pub request_id: usize,
    pub success: bool,
    /// Observed wall-clock time in milliseconds, also for failures.
    pub latency_ms: f64,
    /// HTTP status, absent when the request never got a response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestOutcome {
    pub fn success(request_id: usize, latency_ms: f64, status: u16) -> Self {
        Self {
            request_id,
            success: true,
            latency_ms,
            status: Some(status),
            error: None,
        }
    }

    pub fn failure(
        request_id: usize,
        latency_ms: f64,
        status: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            success: false,
            latency_ms,
            status,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunResult {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate_percent: f64,
    pub total_time_sec: f64,
    /// Successful requests per second of wall-clock time.
    pub requests_per_sec: f64,
    /// Absent when no request succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
    /// Failure description → occurrences.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, u64>,
    /// Run-level error, e.g. [`ALL_REQUESTS_FAILED`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn all_failed(&self) -> bool {
        self.total_requests > 0 && self.successful_requests == 0
    }
}

// ---------------------------------------------------------------------------
// Benchmark results
// ---------------------------------------------------------------------------

/// Latency and throughput for one batch size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchSizeResult {
    pub batch_size: usize,
    pub iterations: u32,
    pub successful_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
    /// Predictions per second: `batch_size / (avg_latency_ms / 1000)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Label under which a batch size is reported.
pub fn batch_label(batch_size: usize) -> String {
    format!("batch_{batch_size}")
}

/// Everything the three-stage benchmark measured for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BenchmarkSuite {
    pub single_requests: RunResult,
    pub batch_requests: BTreeMap<String, BatchSizeResult>,
    pub concurrent_requests: RunResult,
}

// ---------------------------------------------------------------------------
// TargetReport / ComparisonReport
// ---------------------------------------------------------------------------

/// Outcome of driving one target: either a result or a top-level error that
/// prevented one (not ready, client failure, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TargetReport<T> {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> TargetReport<T> {
    pub fn completed(target: &Target, result: T) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(target: &Target, error: impl Into<String>) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Terminal artifact of a full run: both targets plus derived ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComparisonReport<C, T> {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub test_config: C,
    pub baseline: TargetReport<T>,
    pub candidate: TargetReport<T>,
    pub comparisons: BTreeMap<String, Comparison>,
}

impl<C, T> ComparisonReport<C, T> {
    /// True when neither target produced a result.
    pub fn no_target_completed(&self) -> bool {
        self.baseline.result.is_none() && self.candidate.result.is_none()
    }
}

pub type LoadTestReport = ComparisonReport<LoadTestConfig, RunResult>;
pub type BenchmarkReport = ComparisonReport<BenchmarkConfig, BenchmarkSuite>;

/// Key of the single comparison in a [`LoadTestReport`].
pub const CMP_LOAD_TEST: &str = "load_test";
/// Keys of the comparisons in a [`BenchmarkReport`].
pub const CMP_SINGLE_REQUESTS: &str = "single_requests";
pub const CMP_CONCURRENT_REQUESTS: &str = "concurrent_requests";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
