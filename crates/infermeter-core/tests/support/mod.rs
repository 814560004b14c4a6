#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::sleep;

use infermeter_core::config::{HarnessConfig, ReadinessConfig, Target};
use infermeter_core::http::PredictClient;
use infermeter_core::{Harness, SampleSet};

/// How the fake model service answers.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Sleep before answering a prediction.
    pub delay: Duration,
    /// Answer 500 to every prediction whose 1-based sequence number is a
    /// multiple of this.
    pub fail_every: Option<u64>,
    /// Answer 500 to every prediction.
    pub always_fail: bool,
    /// The first this-many `/health` probes answer 503.
    pub unhealthy_probes: u64,
}

impl Behavior {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn fails(&self, seq: u64) -> bool {
        self.always_fail || self.fail_every.is_some_and(|n| seq % n == 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeStats {
    predict_calls: Arc<AtomicU64>,
    batch_calls: Arc<AtomicU64>,
    health_calls: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
}

impl FakeStats {
    pub fn predict_calls(&self) -> u64 {
        self.predict_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> u64 {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> u64 {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// Highest number of prediction handlers that were running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn enter(&self) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct AppState {
    behavior: Arc<Behavior>,
    stats: FakeStats,
}

#[derive(Deserialize)]
struct PredictBody {
    features: Vec<f32>,
}

#[derive(Deserialize)]
struct BatchBody {
    features: Vec<Vec<f32>>,
}

async fn handle_predict(
    State(app): State<AppState>,
    Json(body): Json<PredictBody>,
) -> (StatusCode, Json<Value>) {
    let seq = app.stats.predict_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let _guard = app.stats.enter();
    if !app.behavior.delay.is_zero() {
        sleep(app.behavior.delay).await;
    }
    if app.behavior.fails(seq) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "inference failed"})),
        );
    }
    let prediction: f32 = body.features.iter().sum();
    (StatusCode::OK, Json(json!({"prediction": prediction})))
}

async fn handle_predict_batch(
    State(app): State<AppState>,
    Json(body): Json<BatchBody>,
) -> (StatusCode, Json<Value>) {
    let seq = app.stats.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if let Ok(mut sizes) = app.stats.batch_sizes.lock() {
        sizes.push(body.features.len());
    }
    let _guard = app.stats.enter();
    if !app.behavior.delay.is_zero() {
        sleep(app.behavior.delay).await;
    }
    if app.behavior.fails(seq) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "inference failed"})),
        );
    }
    let predictions: Vec<f32> = body.features.iter().map(|f| f.iter().sum()).collect();
    (StatusCode::OK, Json(json!({"predictions": predictions})))
}

async fn handle_health(State(app): State<AppState>) -> (StatusCode, Json<Value>) {
    let seq = app.stats.health_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if seq <= app.behavior.unhealthy_probes {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "loading", "model_loaded": false})),
        );
    }
    (StatusCode::OK, Json(json!({"status": "ok", "model_loaded": true})))
}

/// In-process stand-in for a model-serving API.
pub struct FakeModelServer {
    addr: SocketAddr,
    base_url: String,
    stats: FakeStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl FakeModelServer {
    pub async fn start(behavior: Behavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let stats = FakeStats::default();

        let app = Router::new()
            .route("/predict", post(handle_predict))
            .route("/predict/batch", post(handle_predict_batch))
            .route("/health", get(handle_health))
            .with_state(AppState {
                behavior: Arc::new(behavior),
                stats: stats.clone(),
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &FakeStats {
        &self.stats
    }

    pub fn target(&self, name: &str) -> Target {
        Target::new(name, self.base_url.clone())
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Handlers abandoned by a timed-out client may still be sleeping.
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(2), &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }
    }
}

impl Drop for FakeModelServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// A base URL nothing listens on.
pub fn unreachable_target(name: &str) -> Target {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    Target::new(name, format!("http://{addr}"))
}

pub fn sample_pool(n: usize) -> Arc<SampleSet> {
    let samples = (0..n).map(|i| vec![i as f32, 0.5, 1.5]).collect();
    Arc::new(SampleSet::new(samples).expect("pool should be non-empty"))
}

pub fn harness_with_timeout(pool_size: usize, timeout: Duration) -> Harness {
    let client = PredictClient::builder()
        .timeout(timeout)
        .build()
        .expect("client should build");
    Harness::new(client, sample_pool(pool_size))
}

pub fn harness(pool_size: usize) -> Harness {
    harness_with_timeout(pool_size, Duration::from_secs(10))
}

/// Readiness settings that keep failing tests fast.
pub fn fast_readiness() -> ReadinessConfig {
    ReadinessConfig {
        interval_ms: 20,
        probe_timeout_ms: 500,
        max_wait_ms: 300,
    }
}

/// A small configuration pointed at the given targets.
pub fn small_config(baseline: Target, candidate: Target) -> HarnessConfig {
    let mut config = HarnessConfig {
        baseline,
        candidate,
        readiness: fast_readiness(),
        ..HarnessConfig::default()
    };
    config.load_test.total_requests = 60;
    config.load_test.concurrent_workers = 6;
    config.load_test.progress_every = 20;
    config.benchmark.single_requests = 12;
    config.benchmark.batch_sizes = vec![1, 4];
    config.benchmark.batch_iterations = 3;
    config.benchmark.concurrent_users = 3;
    config.benchmark.requests_per_user = 4;
    config
}
