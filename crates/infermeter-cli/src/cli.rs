use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use infermeter_core::HarnessConfig;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 30s, 250ms, 2m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 30s, 250ms, 2m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 30s, 250ms, 2m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 30s, 250ms, 2m)"
        )),
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressFormat {
    /// One readable line per event.
    #[default]
    Human,
    /// One JSON object per event (NDJSON).
    Json,
    /// No progress output.
    Off,
}

#[derive(Debug, Parser)]
#[command(
    name = "infermeter",
    author,
    version,
    about = "Compare two model-serving APIs under load",
    long_about = concat!(
        "infermeter drives a baseline and a candidate prediction API with the same workload ",
        "and reports latency, throughput and the candidate-over-baseline speedup.\n\n",
        "Both targets must expose `POST /predict`, `POST /predict/batch` and `GET /health`. ",
        "Values come from built-in defaults, then the optional --config file, then flags and ",
        "environment variables."
    ),
    after_help = concat!(
        "Examples:\n",
        "  infermeter\n",
        "  infermeter load-test --requests 5000 --workers 100\n",
        "  infermeter benchmark --batch-sizes 1,8,32\n",
        "  infermeter --candidate-url http://10.0.0.5:8001 load-test --deadline 2m"
    )
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// What to run (defaults to load-test)
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fixed-size worker pool hammering /predict on both targets
    LoadTest(LoadTestArgs),

    /// Single, batch and concurrent request benchmarks on both targets
    Benchmark(BenchmarkArgs),
}

#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// JSON config file; missing fields take their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the baseline API
    #[arg(long, global = true, env = "INFERMETER_BASELINE_URL")]
    pub baseline_url: Option<String>,

    /// Base URL of the candidate API
    #[arg(long, global = true, env = "INFERMETER_CANDIDATE_URL")]
    pub candidate_url: Option<String>,

    /// Display name of the baseline API
    #[arg(long, global = true)]
    pub baseline_name: Option<String>,

    /// Display name of the candidate API
    #[arg(long, global = true)]
    pub candidate_name: Option<String>,

    /// Test data file (`{"samples": [[...], ...]}`)
    #[arg(long, global = true, env = "INFERMETER_DATA")]
    pub data: Option<PathBuf>,

    /// Directory the JSON report is written to (created if missing)
    #[arg(long, global = true, env = "INFERMETER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Per-request timeout (e.g. 30s, 500ms)
    #[arg(long, global = true, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Upper bound on waiting for each target's /health (e.g. 2m)
    #[arg(long, global = true, value_parser = parse_duration)]
    pub ready_timeout: Option<Duration>,

    /// Progress output written to stderr while runs are in flight
    #[arg(long, global = true, value_enum, default_value_t = ProgressFormat::Human)]
    pub progress: ProgressFormat,
}

#[derive(Debug, Default, Args)]
pub struct LoadTestArgs {
    /// Total number of requests per target
    #[arg(long)]
    pub requests: Option<u64>,

    /// Number of concurrent workers (max requests in flight)
    #[arg(long)]
    pub workers: Option<u32>,

    /// Emit a progress line every N completed requests
    #[arg(long)]
    pub progress_every: Option<u64>,

    /// Stop dispatching after this long; unsent requests count as failed (e.g. 90s)
    #[arg(long, value_parser = parse_duration)]
    pub deadline: Option<Duration>,
}

#[derive(Debug, Default, Args)]
pub struct BenchmarkArgs {
    /// Number of sequential single-sample requests
    #[arg(long)]
    pub single_requests: Option<u64>,

    /// Batch sizes to measure, comma separated
    #[arg(long, value_delimiter = ',')]
    pub batch_sizes: Option<Vec<usize>>,

    /// Timed iterations per batch size (after one warm-up)
    #[arg(long)]
    pub batch_iterations: Option<u32>,

    /// Number of concurrent users
    #[arg(long)]
    pub concurrent_users: Option<u32>,

    /// Sequential requests issued by each concurrent user
    #[arg(long)]
    pub requests_per_user: Option<u64>,
}

impl GlobalArgs {
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.baseline_url {
            config.baseline.url = url.clone();
        }
        if let Some(url) = &self.candidate_url {
            config.candidate.url = url.clone();
        }
        if let Some(name) = &self.baseline_name {
            config.baseline.name = name.clone();
        }
        if let Some(name) = &self.candidate_name {
            config.candidate.name = name.clone();
        }
        if let Some(path) = &self.data {
            config.data_path = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_ms = duration_ms(timeout);
        }
        if let Some(wait) = self.ready_timeout {
            config.readiness.max_wait_ms = duration_ms(wait);
        }
    }
}

impl LoadTestArgs {
    pub fn apply(&self, config: &mut HarnessConfig) {
        let lt = &mut config.load_test;
        if let Some(n) = self.requests {
            lt.total_requests = n;
        }
        if let Some(n) = self.workers {
            lt.concurrent_workers = n;
        }
        if let Some(n) = self.progress_every {
            lt.progress_every = n;
        }
        if let Some(d) = self.deadline {
            lt.deadline_ms = Some(duration_ms(d));
        }
    }
}

impl BenchmarkArgs {
    pub fn apply(&self, config: &mut HarnessConfig) {
        let b = &mut config.benchmark;
        if let Some(n) = self.single_requests {
            b.single_requests = n;
        }
        if let Some(sizes) = &self.batch_sizes {
            b.batch_sizes = sizes.clone();
        }
        if let Some(n) = self.batch_iterations {
            b.batch_iterations = n;
        }
        if let Some(n) = self.concurrent_users {
            b.concurrent_users = n;
        }
        if let Some(n) = self.requests_per_user {
            b.requests_per_user = n;
        }
    }
}
