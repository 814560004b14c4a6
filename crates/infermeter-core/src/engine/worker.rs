use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::http::PredictClient;
use crate::results::RequestOutcome;
use crate::samples::SampleSet;

/// Error recorded for requests cut short or never sent because the run
/// deadline passed.
pub const DEADLINE_EXCEEDED: &str = "run deadline exceeded";

/// What every worker task needs; cloned once per spawned worker.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub client: PredictClient,
    pub samples: Arc<SampleSet>,
    pub url: Arc<str>,
    pub tx: mpsc::Sender<RequestOutcome>,
}

/// Issue `requests` sequential predictions. Samples are keyed by the local
/// index, so every worker replays the same sequence; request ids stay unique
/// across workers.
///
/// Returns early only if the aggregation side has gone away.
pub(crate) async fn run_sequential_worker(ctx: WorkerContext, worker_id: usize, requests: usize) {
    for i in 0..requests {
        let request_id = worker_id * requests + i;
        let outcome = ctx
            .client
            .predict(&ctx.url, request_id, ctx.samples.round_robin(i))
            .await;
        if ctx.tx.send(outcome).await.is_err() {
            return;
        }
    }
}

/// Pull request ids from the shared counter until `total` is exhausted. One
/// request in flight per worker, so the pool size bounds concurrency.
///
/// Once `cancel` fires, the in-flight request resolves as a failure and every
/// remaining id is recorded as failed without being sent, keeping the outcome
/// count equal to `total`.
pub(crate) async fn run_pool_worker(
    ctx: WorkerContext,
    next: Arc<AtomicUsize>,
    total: usize,
    cancel: CancellationToken,
) {
    loop {
        let request_id = next.fetch_add(1, Ordering::Relaxed);
        if request_id >= total {
            return;
        }

        let outcome = if cancel.is_cancelled() {
            RequestOutcome::failure(request_id, 0.0, None, DEADLINE_EXCEEDED)
        } else {
            let start = Instant::now();
            let features = ctx.samples.round_robin(request_id);
            tokio::select! {
                outcome = ctx.client.predict(&ctx.url, request_id, features) => outcome,
                _ = cancel.cancelled() => RequestOutcome::failure(
                    request_id,
                    start.elapsed().as_secs_f64() * 1000.0,
                    None,
                    DEADLINE_EXCEEDED,
                ),
            }
        };

        if ctx.tx.send(outcome).await.is_err() {
            return;
        }
    }
}
