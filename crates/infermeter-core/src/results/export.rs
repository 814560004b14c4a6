use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::Serialize;

use super::{
    BatchSizeResult, BenchmarkReport, Comparison, ComparisonReport, LatencyBasis, LoadTestReport,
    RunResult, TargetReport,
};
use crate::error::InfermeterError;

/// File name of the persisted load-test report.
pub const LOAD_TEST_RESULTS_FILE: &str = "concurrent_load_test_results.json";
/// File name of the persisted benchmark report.
pub const BENCHMARK_RESULTS_FILE: &str = "benchmark_results.json";

const RULE: &str = "============================================================";

// ---------------------------------------------------------------------------
// JSON export
// ---------------------------------------------------------------------------

/// Export a report as pretty-printed JSON.
pub fn export_json<C, T>(report: &ComparisonReport<C, T>) -> Result<String, serde_json::Error>
where
    C: Serialize,
    T: Serialize,
{
    serde_json::to_string_pretty(report)
}

/// Write `report` as `<dir>/<file_name>`, creating `dir` if needed.
pub async fn write_report<C, T>(
    report: &ComparisonReport<C, T>,
    dir: impl AsRef<Path>,
    file_name: &str,
) -> Result<PathBuf, InfermeterError>
where
    C: Serialize,
    T: Serialize,
{
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    let content = export_json(report)?;
    tokio::fs::write(&path, content).await?;
    tracing::info!(path = %path.display(), "results saved");
    Ok(path)
}

// ---------------------------------------------------------------------------
// Human-readable summaries
// ---------------------------------------------------------------------------

/// Render the load-test comparison printed at the end of a run.
pub fn render_load_test_summary(report: &LoadTestReport) -> String {
    let mut out = String::new();
    header(&mut out, "CONCURRENT LOAD TEST RESULTS", report);
    let _ = writeln!(
        out,
        "Config: {} requests, {} concurrent workers",
        report.test_config.total_requests, report.test_config.concurrent_workers
    );

    for target in [&report.baseline, &report.candidate] {
        out.push('\n');
        target_heading(&mut out, target);
        if let Some(run) = &target.result {
            render_run(&mut out, run);
        }
    }

    render_comparisons(&mut out, report);
    out
}

/// Render the benchmark comparison printed at the end of a run.
pub fn render_benchmark_summary(report: &BenchmarkReport) -> String {
    let mut out = String::new();
    header(&mut out, "BENCHMARK RESULTS COMPARISON", report);

    for target in [&report.baseline, &report.candidate] {
        out.push('\n');
        target_heading(&mut out, target);
        let Some(suite) = &target.result else {
            continue;
        };
        out.push_str("  Single requests:\n");
        render_run(&mut out, &suite.single_requests);
        out.push_str("  Batch requests:\n");
        let mut batches: Vec<&BatchSizeResult> = suite.batch_requests.values().collect();
        batches.sort_by_key(|b| b.batch_size);
        for batch in batches {
            render_batch(&mut out, batch);
        }
        out.push_str("  Concurrent requests:\n");
        render_run(&mut out, &suite.concurrent_requests);
    }

    render_comparisons(&mut out, report);
    out
}

fn header<C, T>(out: &mut String, title: &str, report: &ComparisonReport<C, T>) {
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "Run {} at {}",
        report.run_id.hyphenated(),
        report.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
}

fn target_heading<T>(out: &mut String, target: &TargetReport<T>) {
    match &target.error {
        Some(err) => {
            let _ = writeln!(out, "{} ({}): FAILED - {err}", target.name, target.url);
        }
        None => {
            let _ = writeln!(out, "{} ({}):", target.name, target.url);
        }
    }
}

fn render_run(out: &mut String, run: &RunResult) {
    let _ = writeln!(
        out,
        "    Requests:   {} total, {} ok, {} failed ({:.1}% success)",
        run.total_requests, run.successful_requests, run.failed_requests, run.success_rate_percent
    );
    let _ = writeln!(out, "    Total time: {:.2} s", run.total_time_sec);
    let _ = writeln!(out, "    Throughput: {:.1} req/sec", run.requests_per_sec);
    match &run.latency {
        Some(l) => {
            let _ = writeln!(
                out,
                concat!(
                    "    Latency:    avg {:.2}ms  median {:.2}ms  p95 {:.2}ms  ",
                    "p99 {:.2}ms  min {:.2}ms  max {:.2}ms"
                ),
                l.avg_latency_ms,
                l.median_latency_ms,
                l.p95_latency_ms,
                l.p99_latency_ms,
                l.min_latency_ms,
                l.max_latency_ms
            );
        }
        None => {
            let _ = writeln!(
                out,
                "    Latency:    n/a ({})",
                run.error.as_deref().unwrap_or("no successful requests")
            );
        }
    }
    for (error, count) in &run.errors {
        let _ = writeln!(out, "    Error x{count}: {error}");
    }
}

fn render_batch(out: &mut String, batch: &BatchSizeResult) {
    match (batch.avg_latency_ms, &batch.error) {
        (Some(avg), _) => {
            let _ = writeln!(
                out,
                "    batch {:>4}: avg {:.2}ms, {:.1} predictions/sec ({}/{} ok)",
                batch.batch_size,
                avg,
                batch.throughput_per_sec.unwrap_or(0.0),
                batch.successful_iterations,
                batch.iterations
            );
        }
        (None, error) => {
            let _ = writeln!(
                out,
                "    batch {:>4}: failed ({})",
                batch.batch_size,
                error.as_deref().unwrap_or("no successful iterations")
            );
        }
    }
}

fn render_comparisons<C, T>(out: &mut String, report: &ComparisonReport<C, T>) {
    let baseline = &report.baseline.name;
    let candidate = &report.candidate.name;
    for (name, comparison) in &report.comparisons {
        let _ = writeln!(out, "\nComparison [{name}]: {candidate} vs {baseline}");
        match comparison {
            Comparison::Speedup {
                throughput_speedup,
                latency_speedup,
                total_time_speedup,
                latency_basis,
            } => {
                let basis = match latency_basis {
                    LatencyBasis::Mean => "Mean latency",
                    LatencyBasis::P95 => "P95 latency",
                };
                let _ = writeln!(out, "  Throughput: {throughput_speedup:.2}x");
                let _ = writeln!(out, "  {basis}: {latency_speedup:.2}x faster");
                let _ = writeln!(out, "  Total time: {total_time_speedup:.2}x faster");
            }
            Comparison::Unavailable { reasons } => {
                out.push_str("  Not comparable:\n");
                for reason in reasons {
                    let _ = writeln!(out, "    - {reason}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
