mod support;

use std::time::Duration;

use infermeter_core::config::ReadinessConfig;
use infermeter_core::readiness::wait_until_ready;
use infermeter_core::InfermeterError;
use support::{Behavior, FakeModelServer};

#[tokio::test]
async fn waits_through_unhealthy_probes() -> Result<(), InfermeterError> {
    let server = FakeModelServer::start(Behavior {
        unhealthy_probes: 2,
        ..Behavior::default()
    })
    .await?;
    let harness = support::harness(1);
    let config = ReadinessConfig {
        interval_ms: 20,
        probe_timeout_ms: 500,
        max_wait_ms: 5_000,
    };

    wait_until_ready(harness.client(), &server.target("rust"), &config).await?;

    let probes = server.stats().health_calls();
    server.shutdown().await;
    assert_eq!(probes, 3);
    Ok(())
}

#[tokio::test]
async fn gives_up_after_max_wait_with_last_reason() -> Result<(), InfermeterError> {
    let server = FakeModelServer::start(Behavior {
        unhealthy_probes: u64::MAX,
        ..Behavior::default()
    })
    .await?;
    let harness = support::harness(1);

    let target = server.target("python");
    let err = wait_until_ready(harness.client(), &target, &support::fast_readiness())
        .await
        .expect_err("target never becomes healthy");
    let probes = server.stats().health_calls();
    server.shutdown().await;

    match err {
        InfermeterError::NotReady {
            name,
            waited_ms,
            reason,
            ..
        } => {
            assert_eq!(name, "python");
            assert!(waited_ms >= 300);
            assert_eq!(reason, "health check returned HTTP 503");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(probes >= 2);
    Ok(())
}

#[tokio::test]
async fn unreachable_target_is_not_ready() {
    let harness = support::harness(1);
    let target = support::unreachable_target("rust");

    let started = std::time::Instant::now();
    let err = wait_until_ready(harness.client(), &target, &support::fast_readiness())
        .await
        .expect_err("nothing listens there");

    assert!(err
        .to_string()
        .starts_with(&format!("rust API at {} not ready", target.url)));
    assert!(started.elapsed() < Duration::from_secs(5));
    match err {
        InfermeterError::NotReady { reason, .. } => {
            // The transport's root cause survives, not just reqwest's summary.
            assert!(
                reason.to_lowercase().contains("refused"),
                "reason: {reason}"
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}
