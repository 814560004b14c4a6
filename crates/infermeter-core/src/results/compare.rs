use serde::{Deserialize, Serialize};

use crate::engine::aggregator::LatencyStats;
use crate::results::{RunResult, TargetReport};

/// Which latency statistic a latency speedup is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyBasis {
    Mean,
    P95,
}

impl LatencyBasis {
    fn pick(self, stats: &LatencyStats) -> f64 {
        match self {
            LatencyBasis::Mean => stats.avg_latency_ms,
            LatencyBasis::P95 => stats.p95_latency_ms,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LatencyBasis::Mean => "mean latency",
            LatencyBasis::P95 => "p95 latency",
        }
    }
}

/// Candidate-over-baseline ratios, or the reasons they could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Comparison {
    Speedup {
        /// `rps(candidate) / rps(baseline)`.
        throughput_speedup: f64,
        /// `latency(baseline) / latency(candidate)`.
        latency_speedup: f64,
        /// `time(baseline) / time(candidate)`.
        total_time_speedup: f64,
        latency_basis: LatencyBasis,
    },
    Unavailable {
        reasons: Vec<String>,
    },
}

impl Comparison {
    pub fn is_available(&self) -> bool {
        matches!(self, Comparison::Speedup { .. })
    }
}

/// Compare two target reports. A top-level error on either side short-circuits
/// to [`Comparison::Unavailable`] carrying that error; otherwise the runs
/// chosen by `select` are compared with [`compare_runs`].
pub fn compare_targets<T, F>(
    baseline: &TargetReport<T>,
    candidate: &TargetReport<T>,
    basis: LatencyBasis,
    select: F,
) -> Comparison
where
    F: Fn(&T) -> &RunResult,
{
    let mut reasons = Vec::new();
    for report in [baseline, candidate] {
        match (&report.error, &report.result) {
            (Some(err), _) => reasons.push(format!("{} API failed: {err}", report.name)),
            (None, None) => reasons.push(format!("{} API produced no result", report.name)),
            (None, Some(_)) => {}
        }
    }

    match (&baseline.result, &candidate.result) {
        (Some(a), Some(b)) if reasons.is_empty() => compare_runs(
            &baseline.name,
            select(a),
            &candidate.name,
            select(b),
            basis,
        ),
        _ => Comparison::Unavailable { reasons },
    }
}

/// Compute speedup ratios between two runs.
///
/// Run-level errors are surfaced instead of ratios, and every division is
/// guarded: a zero, non-finite or missing denominator becomes a reason.
pub fn compare_runs(
    baseline_name: &str,
    baseline: &RunResult,
    candidate_name: &str,
    candidate: &RunResult,
    basis: LatencyBasis,
) -> Comparison {
    let mut reasons = Vec::new();
    for (name, run) in [(baseline_name, baseline), (candidate_name, candidate)] {
        if let Some(err) = &run.error {
            reasons.push(format!("{name} API failed: {err}"));
        }
    }
    if !reasons.is_empty() {
        return Comparison::Unavailable { reasons };
    }

    let throughput = ratio(
        candidate.requests_per_sec,
        baseline.requests_per_sec,
        || format!("{baseline_name} throughput is zero"),
    );

    let latency = match (&baseline.latency, &candidate.latency) {
        (Some(a), Some(b)) => ratio(basis.pick(a), basis.pick(b), || {
            format!("{candidate_name} {} is zero", basis.label())
        }),
        (None, _) => Err(format!("{baseline_name} has no latency statistics")),
        (_, None) => Err(format!("{candidate_name} has no latency statistics")),
    };

    let total_time = ratio(baseline.total_time_sec, candidate.total_time_sec, || {
        format!("{candidate_name} total time is zero")
    });

    match (throughput, latency, total_time) {
        (Ok(throughput_speedup), Ok(latency_speedup), Ok(total_time_speedup)) => {
            Comparison::Speedup {
                throughput_speedup,
                latency_speedup,
                total_time_speedup,
                latency_basis: basis,
            }
        }
        (t, l, tt) => Comparison::Unavailable {
            reasons: [t, l, tt].into_iter().filter_map(Result::err).collect(),
        },
    }
}

fn ratio(numerator: f64, denominator: f64, why: impl FnOnce() -> String) -> Result<f64, String> {
    if denominator.is_finite() && denominator > 0.0 && numerator.is_finite() {
        Ok(numerator / denominator)
    } else {
        Err(why())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
