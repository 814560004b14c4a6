use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::config::{HarnessConfig, Target};
use crate::engine::Harness;
use crate::readiness::wait_until_ready;
use crate::results::{
    compare_targets, BenchmarkReport, BenchmarkSuite, ComparisonReport, LatencyBasis,
    LoadTestReport, RunResult, TargetReport, CMP_CONCURRENT_REQUESTS, CMP_LOAD_TEST,
    CMP_SINGLE_REQUESTS,
};

/// Load-test baseline then candidate and compare them on p95 latency and
/// throughput. A target that is not ready or fails is recorded in the report
/// and the other target still runs.
pub async fn run_load_test_comparison(harness: &Harness, config: &HarnessConfig) -> LoadTestReport {
    let timestamp = Utc::now();
    let baseline = drive_load_test(harness, &config.baseline, config).await;
    let candidate = drive_load_test(harness, &config.candidate, config).await;

    let mut comparisons = BTreeMap::new();
    comparisons.insert(
        CMP_LOAD_TEST.to_string(),
        compare_targets(&baseline, &candidate, LatencyBasis::P95, |run| run),
    );

    ComparisonReport {
        run_id: Uuid::new_v4(),
        timestamp,
        test_config: config.load_test.clone(),
        baseline,
        candidate,
        comparisons,
    }
}

/// Run the single/batch/concurrent benchmark against both targets and compare
/// single-request mean latency and concurrent throughput.
pub async fn run_benchmark_comparison(
    harness: &Harness,
    config: &HarnessConfig,
) -> BenchmarkReport {
    let timestamp = Utc::now();
    let baseline = drive_benchmark(harness, &config.baseline, config).await;
    let candidate = drive_benchmark(harness, &config.candidate, config).await;

    let mut comparisons = BTreeMap::new();
    comparisons.insert(
        CMP_SINGLE_REQUESTS.to_string(),
        compare_targets(&baseline, &candidate, LatencyBasis::Mean, |suite| {
            &suite.single_requests
        }),
    );
    comparisons.insert(
        CMP_CONCURRENT_REQUESTS.to_string(),
        compare_targets(&baseline, &candidate, LatencyBasis::Mean, |suite| {
            &suite.concurrent_requests
        }),
    );

    ComparisonReport {
        run_id: Uuid::new_v4(),
        timestamp,
        test_config: config.benchmark.clone(),
        baseline,
        candidate,
        comparisons,
    }
}

async fn drive_load_test(
    harness: &Harness,
    target: &Target,
    config: &HarnessConfig,
) -> TargetReport<RunResult> {
    if let Err(e) = wait_until_ready(harness.client(), target, &config.readiness).await {
        tracing::error!(target = %target.name, "{e}");
        return TargetReport::failed(target, e.to_string());
    }

    match harness.load_test(target, &config.load_test).await {
        Ok(result) => TargetReport::completed(target, result),
        Err(e) => {
            tracing::error!(target = %target.name, "load test failed: {e}");
            TargetReport::failed(target, e.to_string())
        }
    }
}

async fn drive_benchmark(
    harness: &Harness,
    target: &Target,
    config: &HarnessConfig,
) -> TargetReport<BenchmarkSuite> {
    if let Err(e) = wait_until_ready(harness.client(), target, &config.readiness).await {
        tracing::error!(target = %target.name, "{e}");
        return TargetReport::failed(target, e.to_string());
    }

    let b = &config.benchmark;
    let single_requests = harness.single_request_run(target, b.single_requests).await;
    let batch_requests = harness
        .batch_run(target, &b.batch_sizes, b.batch_iterations)
        .await;
    let concurrent_requests = match harness
        .concurrent_run(target, b.concurrent_users, b.requests_per_user)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(target = %target.name, "concurrent benchmark failed: {e}");
            return TargetReport::failed(target, e.to_string());
        }
    };

    TargetReport::completed(
        target,
        BenchmarkSuite {
            single_requests,
            batch_requests,
            concurrent_requests,
        },
    )
}
