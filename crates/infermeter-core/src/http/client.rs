use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::join_url;
use crate::error::{error_chain, InfermeterError};
use crate::http::request::{BatchPredictRequest, PredictRequest};
use crate::http::response::HealthResponse;
use crate::http::{PATH_HEALTH, PATH_PREDICT, PATH_PREDICT_BATCH};
use crate::results::RequestOutcome;

/// Wrapper around a reqwest Client that turns every prediction call into a
/// timed [`RequestOutcome`].
///
/// Cloning is cheap and shares the connection pool, so each worker task holds
/// its own clone.
#[derive(Debug, Clone)]
pub struct PredictClient {
    inner: reqwest::Client,
    timeout: Duration,
}

/// Idle keep-alive connections kept per target between requests.
const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Builder for [`PredictClient`].
pub struct PredictClientBuilder {
    timeout: Duration,
}

impl Default for PredictClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl PredictClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-request timeout; expiry yields a failed outcome.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<PredictClient, InfermeterError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(concat!("infermeter/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(PredictClient {
            inner: client,
            timeout: self.timeout,
        })
    }
}

/// Result of one `/health` probe.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    pub status: u16,
    /// Decoded body, when the service returned the expected shape.
    pub body: Option<HealthResponse>,
}

impl HealthProbe {
    pub fn is_ready(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl PredictClient {
    /// Returns a builder for customising the client.
    pub fn builder() -> PredictClientBuilder {
        PredictClientBuilder::new()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `POST {base_url}/predict` with a single feature vector.
    pub async fn predict(
        &self,
        base_url: &str,
        request_id: usize,
        features: &[f32],
    ) -> RequestOutcome {
        let url = join_url(base_url, PATH_PREDICT);
        self.timed_post(&url, request_id, &PredictRequest { features }).await
    }

    /// `POST {base_url}/predict/batch` with a batch of feature vectors.
    pub async fn predict_batch(
        &self,
        base_url: &str,
        request_id: usize,
        batch: &[Vec<f32>],
    ) -> RequestOutcome {
        let url = join_url(base_url, PATH_PREDICT_BATCH);
        self.timed_post(&url, request_id, &BatchPredictRequest { features: batch }).await
    }

    /// `GET {base_url}/health` with its own, usually shorter, timeout.
    pub async fn health(
        &self,
        base_url: &str,
        probe_timeout: Duration,
    ) -> Result<HealthProbe, InfermeterError> {
        let response = self
            .inner
            .get(join_url(base_url, PATH_HEALTH))
            .timeout(probe_timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice::<HealthResponse>(&bytes).ok();
        Ok(HealthProbe { status, body })
    }

    /// Send `body`, drain the response and classify it. Latency covers the
    /// whole exchange, from just before `send()` until the body is received.
    ///
    /// Transport errors, timeouts and non-2xx statuses all become failed
    /// outcomes; nothing here returns early with an error.
    async fn timed_post<B>(&self, url: &str, request_id: usize, body: &B) -> RequestOutcome
    where
        B: Serialize + ?Sized,
    {
        let start = Instant::now();
        let result = self.send_and_drain(url, body).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(status) if status.is_success() => {
                RequestOutcome::success(request_id, latency_ms, status.as_u16())
            }
            Ok(status) => RequestOutcome::failure(
                request_id,
                latency_ms,
                Some(status.as_u16()),
                format!("HTTP {}", status.as_u16()),
            ),
            Err(e) => RequestOutcome::failure(request_id, latency_ms, None, self.describe(&e)),
        }
    }

    async fn send_and_drain<B>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::StatusCode, reqwest::Error>
    where
        B: Serialize + ?Sized,
    {
        let response = self.inner.post(url).json(body).send().await?;
        let status = response.status();
        response.bytes().await?;
        Ok(status)
    }

    fn describe(&self, e: &reqwest::Error) -> String {
        if e.is_timeout() {
            format!("request timed out after {}ms", self.timeout.as_millis())
        } else if e.is_connect() {
            format!("connection failed: {}", error_chain(e))
        } else {
            e.to_string()
        }
    }
}
