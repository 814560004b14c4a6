use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InfermeterError;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// A model-serving API under comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Target {
    /// Short label used in logs and as the report key (e.g. `python`).
    pub name: String,
    /// Base URL; `/predict`, `/predict/batch` and `/health` are appended.
    pub url: String,
}

impl Target {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// `url` joined with `path`, tolerating a trailing slash on the base.
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.url, path)
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

// ---------------------------------------------------------------------------
// ReadinessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ReadinessConfig {
    /// Pause between two `/health` probes.
    pub interval_ms: u64,
    /// Timeout applied to each individual probe.
    pub probe_timeout_ms: u64,
    /// Give up once this much time has passed without a 2xx.
    pub max_wait_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            probe_timeout_ms: 5_000,
            max_wait_ms: 120_000,
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

// ---------------------------------------------------------------------------
// LoadTestConfig
// ---------------------------------------------------------------------------

/// Parameters of the bounded-concurrency load test. Persisted verbatim as the
/// report's `test_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LoadTestConfig {
    pub total_requests: u64,
    pub concurrent_workers: u32,
    /// Emit a progress event every this many completions.
    pub progress_every: u64,
    /// Optional deadline for the whole run; unfinished requests count as failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            total_requests: 1_000,
            concurrent_workers: 50,
            progress_every: 100,
            deadline_ms: None,
        }
    }
}

impl LoadTestConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// BenchmarkConfig
// ---------------------------------------------------------------------------

/// Parameters of the three-stage benchmark (single, batch, concurrent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BenchmarkConfig {
    pub single_requests: u64,
    pub batch_sizes: Vec<usize>,
    pub batch_iterations: u32,
    pub concurrent_users: u32,
    pub requests_per_user: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            single_requests: 100,
            batch_sizes: vec![1, 10, 50, 100],
            batch_iterations: 10,
            concurrent_users: 10,
            requests_per_user: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// HarnessConfig
// ---------------------------------------------------------------------------

/// Everything a comparison run needs. Every field has a default so a config
/// file only has to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct HarnessConfig {
    pub baseline: Target,
    pub candidate: Target,
    pub data_path: PathBuf,
    pub output_dir: PathBuf,
    pub request_timeout_ms: u64,
    pub readiness: ReadinessConfig,
    pub load_test: LoadTestConfig,
    pub benchmark: BenchmarkConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            baseline: Target::new("python", "http://localhost:8000"),
            candidate: Target::new("rust", "http://localhost:8001"),
            data_path: PathBuf::from("model/test_data.json"),
            output_dir: PathBuf::from("results"),
            request_timeout_ms: 30_000,
            readiness: ReadinessConfig::default(),
            load_test: LoadTestConfig::default(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, InfermeterError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: HarnessConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate the configuration and return every problem found.
    ///
    /// An empty `Vec` means the configuration is usable.
    pub fn validate(&self) -> Vec<InfermeterError> {
        let mut errors = Vec::new();

        for (role, target) in [("baseline", &self.baseline), ("candidate", &self.candidate)] {
            errors.extend(validate_target(role, target));
        }
        if self.baseline.name == self.candidate.name {
            errors.push(InfermeterError::Validation(format!(
                "baseline and candidate must have different names (both are '{}')",
                self.baseline.name
            )));
        }

        if self.request_timeout_ms == 0 {
            errors.push(InfermeterError::Validation(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        let r = &self.readiness;
        if r.interval_ms == 0 || r.probe_timeout_ms == 0 || r.max_wait_ms == 0 {
            errors.push(InfermeterError::Validation(
                "readiness intervals and timeouts must be greater than 0".to_string(),
            ));
        }

        let lt = &self.load_test;
        if lt.total_requests == 0 {
            errors.push(InfermeterError::Validation(
                "load_test.total_requests must be at least 1".to_string(),
            ));
        }
        if lt.concurrent_workers == 0 {
            errors.push(InfermeterError::Validation(
                "load_test.concurrent_workers must be at least 1".to_string(),
            ));
        }
        if lt.progress_every == 0 {
            errors.push(InfermeterError::Validation(
                "load_test.progress_every must be at least 1".to_string(),
            ));
        }
        if lt.deadline_ms == Some(0) {
            errors.push(InfermeterError::Validation(
                "load_test.deadline_ms must be greater than 0 when set".to_string(),
            ));
        }

        let b = &self.benchmark;
        if b.single_requests == 0 {
            errors.push(InfermeterError::Validation(
                "benchmark.single_requests must be at least 1".to_string(),
            ));
        }
        if b.batch_sizes.is_empty() {
            errors.push(InfermeterError::Validation(
                "benchmark.batch_sizes must not be empty".to_string(),
            ));
        }
        if b.batch_sizes.contains(&0) {
            errors.push(InfermeterError::Validation(
                "benchmark.batch_sizes must not contain 0".to_string(),
            ));
        }
        if b.batch_iterations == 0 {
            errors.push(InfermeterError::Validation(
                "benchmark.batch_iterations must be at least 1".to_string(),
            ));
        }
        if b.concurrent_users == 0 || b.requests_per_user == 0 {
            errors.push(InfermeterError::Validation(
                "benchmark.concurrent_users and requests_per_user must be at least 1".to_string(),
            ));
        }

        errors
    }
}

fn validate_target(role: &str, target: &Target) -> Vec<InfermeterError> {
    let mut errors = Vec::new();

    if target.name.trim().is_empty() {
        errors.push(InfermeterError::Validation(format!(
            "{role} target name must not be empty"
        )));
    }

    let url = target.url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        errors.push(InfermeterError::Validation(format!(
            "{role} target '{}': URL must start with http:// or https:// (got: {})",
            target.name, target.url
        )));
    }

    errors
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
