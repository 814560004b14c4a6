use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::config::{ReadinessConfig, Target};
use crate::error::{error_chain, InfermeterError};
use crate::http::{PredictClient, PATH_HEALTH};

/// Poll `GET {target}/health` until it answers 2xx.
///
/// Probes run every `interval` with their own `probe_timeout`. The wait is
/// bounded by `max_wait`; running out is a [`InfermeterError::NotReady`]
/// carrying the last failure seen. Returns how long the target took.
pub async fn wait_until_ready(
    client: &PredictClient,
    target: &Target,
    config: &ReadinessConfig,
) -> Result<Duration, InfermeterError> {
    let start = Instant::now();
    let deadline = start + config.max_wait();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let reason = match client.health(&target.url, config.probe_timeout()).await {
            Ok(probe) if probe.is_ready() => {
                let waited = start.elapsed();
                tracing::info!(
                    target = %target.name,
                    attempts = attempt,
                    waited_ms = waited.as_millis() as u64,
                    model_loaded = ?probe.body.map(|b| b.model_loaded),
                    "API is ready"
                );
                return Ok(waited);
            }
            Ok(probe) => format!("health check returned HTTP {}", probe.status),
            Err(e) => error_chain(&e),
        };
        tracing::debug!(
            target = %target.name,
            url = %target.endpoint(PATH_HEALTH),
            attempt,
            %reason,
            "API not ready yet"
        );

        let now = Instant::now();
        if now >= deadline {
            return Err(InfermeterError::NotReady {
                name: target.name.clone(),
                url: target.url.clone(),
                waited_ms: start.elapsed().as_millis() as u64,
                reason,
            });
        }
        sleep(config.interval().min(deadline - now)).await;
    }
}
