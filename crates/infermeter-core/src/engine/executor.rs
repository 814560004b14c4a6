use std::collections::BTreeMap;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{LoadTestConfig, Target};
use crate::engine::aggregator::{OutcomeAggregator, MAX_PREALLOCATED_LATENCIES};
use crate::engine::worker::{run_pool_worker, run_sequential_worker, WorkerContext};
use crate::engine::{EngineEvent, RunMode};
use crate::error::InfermeterError;
use crate::http::PredictClient;
use crate::results::{batch_label, BatchSizeResult, RequestOutcome, RunResult, ALL_REQUESTS_FAILED};
use crate::samples::SampleSet;

/// Capacity of the channel between workers and the aggregation loop.
const OUTCOME_CHANNEL_CAPACITY: usize = 4096;

/// Drives targets and turns request outcomes into results.
///
/// Built once by the entry point and borrowed by every run; owns the shared
/// HTTP connection pool and the read-only sample pool.
pub struct Harness {
    client: PredictClient,
    samples: Arc<SampleSet>,
    events: Option<mpsc::Sender<EngineEvent>>,
}

impl Harness {
    pub fn new(client: PredictClient, samples: Arc<SampleSet>) -> Self {
        Self {
            client,
            samples,
            events: None,
        }
    }

    /// Stream [`EngineEvent`]s to `tx`. Events are dropped rather than awaited
    /// when the receiver falls behind, so a slow consumer never stalls a run.
    pub fn with_events(mut self, tx: mpsc::Sender<EngineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn client(&self) -> &PredictClient {
        &self.client
    }

    // -----------------------------------------------------------------------
    // Single requests
    // -----------------------------------------------------------------------

    /// Issue `sample_count` sequential predictions, sample `i mod len` each.
    ///
    /// Failures are counted but excluded from latency statistics; a run
    /// without any success reports [`ALL_REQUESTS_FAILED`].
    pub async fn single_request_run(&self, target: &Target, sample_count: u64) -> RunResult {
        self.run_started(target, RunMode::SingleRequests, sample_count);

        let count = sample_count as usize;
        let mut agg = OutcomeAggregator::with_capacity(count);
        let start = Instant::now();
        for i in 0..count {
            let outcome = self
                .client
                .predict(&target.url, i, self.samples.round_robin(i))
                .await;
            agg.record(&outcome);
        }

        let result = agg.finish(start.elapsed());
        self.run_finished(target, RunMode::SingleRequests, &result);
        result
    }

    // -----------------------------------------------------------------------
    // Batch requests
    // -----------------------------------------------------------------------

    /// For every size in `batch_sizes`, send the first `size` samples as one
    /// batch: one discarded warm-up call, then `iterations` timed calls.
    pub async fn batch_run(
        &self,
        target: &Target,
        batch_sizes: &[usize],
        iterations: u32,
    ) -> BTreeMap<String, BatchSizeResult> {
        let planned = (batch_sizes.len() as u64).saturating_mul(u64::from(iterations) + 1);
        self.run_started(target, RunMode::BatchRequests, planned);
        let start = Instant::now();

        let mut results = BTreeMap::new();
        let (mut ok, mut failed) = (0u64, 0u64);
        for &size in batch_sizes {
            let batch = self.samples.front(size);
            if batch.len() < size {
                tracing::warn!(
                    target = %target.name,
                    requested = size,
                    available = batch.len(),
                    "batch size exceeds sample pool, sending the whole pool"
                );
            }

            let warmup = self.client.predict_batch(&target.url, 0, batch).await;
            if !warmup.success {
                tracing::warn!(
                    target = %target.name,
                    batch_size = size,
                    error = warmup.error.as_deref().unwrap_or_default(),
                    "warm-up batch failed"
                );
            }

            let mut latencies =
                Vec::with_capacity((iterations as usize).min(MAX_PREALLOCATED_LATENCIES));
            let mut last_error = None;
            for i in 0..iterations as usize {
                let outcome = self.client.predict_batch(&target.url, i + 1, batch).await;
                if outcome.success {
                    latencies.push(outcome.latency_ms);
                } else {
                    last_error = outcome.error;
                }
            }
            ok += latencies.len() as u64;
            failed += u64::from(iterations) - latencies.len() as u64;

            results.insert(
                batch_label(size),
                summarize_batch(batch.len(), iterations, &latencies, last_error),
            );
        }

        self.emit(EngineEvent::RunFinished {
            target: target.name.clone(),
            mode: RunMode::BatchRequests,
            successful: ok,
            failed,
            elapsed_ms: start.elapsed().as_millis() as u64,
        });
        results
    }

    // -----------------------------------------------------------------------
    // Concurrent requests
    // -----------------------------------------------------------------------

    /// Run `workers` workers in parallel, each issuing `requests_per_worker`
    /// sequential predictions. Wall-clock time spans dispatch of the first
    /// worker to completion of the last.
    pub async fn concurrent_run(
        &self,
        target: &Target,
        workers: u32,
        requests_per_worker: u64,
    ) -> Result<RunResult, InfermeterError> {
        let planned = u64::from(workers).saturating_mul(requests_per_worker);
        self.run_started(target, RunMode::ConcurrentRequests, planned);

        let (tx, mut rx) = mpsc::channel::<RequestOutcome>(OUTCOME_CHANNEL_CAPACITY);
        let ctx = self.worker_context(target, tx);
        let start = Instant::now();

        let mut worker_set = JoinSet::new();
        for worker_id in 0..workers as usize {
            worker_set.spawn(run_sequential_worker(
                ctx.clone(),
                worker_id,
                requests_per_worker as usize,
            ));
        }
        // Close the channel once every worker has dropped its clone.
        drop(ctx);

        let expected = usize::try_from(planned).unwrap_or(usize::MAX);
        let mut agg = OutcomeAggregator::with_capacity(expected);
        while let Some(outcome) = rx.recv().await {
            agg.record(&outcome);
        }
        let elapsed = start.elapsed();
        join_workers(&mut worker_set).await?;

        let result = agg.finish(elapsed);
        self.run_finished(target, RunMode::ConcurrentRequests, &result);
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Load test
    // -----------------------------------------------------------------------

    /// Dispatch `total_requests` predictions over a pool of
    /// `concurrent_workers` workers, so at most that many are in flight.
    ///
    /// Individual failures never abort the run. Every dispatched id yields
    /// exactly one outcome, so `successful + failed == total_requests`; a
    /// mismatch is reported as an engine error.
    pub async fn load_test(
        &self,
        target: &Target,
        config: &LoadTestConfig,
    ) -> Result<RunResult, InfermeterError> {
        let total = config.total_requests as usize;
        let progress_every = config.progress_every.max(1);
        self.run_started(target, RunMode::LoadTest, config.total_requests);
        tracing::info!(
            target = %target.name,
            total_requests = config.total_requests,
            concurrent_workers = config.concurrent_workers,
            "running load test"
        );

        let cancel = CancellationToken::new();
        let deadline_task = config.deadline().map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!(deadline_ms = deadline.as_millis() as u64, "run deadline reached");
                cancel.cancel();
            })
        });

        let (tx, mut rx) = mpsc::channel::<RequestOutcome>(OUTCOME_CHANNEL_CAPACITY);
        let ctx = self.worker_context(target, tx);
        let next = Arc::new(AtomicUsize::new(0));
        let pool_size = (config.concurrent_workers as usize).min(total);
        let start = Instant::now();

        let mut worker_set = JoinSet::new();
        for _ in 0..pool_size {
            worker_set.spawn(run_pool_worker(
                ctx.clone(),
                Arc::clone(&next),
                total,
                cancel.clone(),
            ));
        }
        drop(ctx);

        let mut agg = OutcomeAggregator::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            agg.record(&outcome);
            let completed = agg.completed();
            if completed % progress_every == 0 {
                let snap = agg.snapshot();
                tracing::debug!(
                    target = %target.name,
                    completed,
                    total,
                    failed = snap.failed,
                    "load test progress"
                );
                self.emit(EngineEvent::Progress {
                    target: target.name.clone(),
                    completed,
                    total: config.total_requests,
                    failed: snap.failed,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        }
        let elapsed = start.elapsed();

        if let Some(task) = deadline_task {
            task.abort();
        }
        join_workers(&mut worker_set).await?;

        let result = agg.finish(elapsed);
        if result.total_requests != config.total_requests {
            return Err(InfermeterError::Engine(format!(
                "collected {} outcomes for {} requests",
                result.total_requests, config.total_requests
            )));
        }

        self.run_finished(target, RunMode::LoadTest, &result);
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn worker_context(&self, target: &Target, tx: mpsc::Sender<RequestOutcome>) -> WorkerContext {
        WorkerContext {
            client: self.client.clone(),
            samples: Arc::clone(&self.samples),
            url: Arc::from(target.url.as_str()),
            tx,
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }

    fn run_started(&self, target: &Target, mode: RunMode, planned_requests: u64) {
        tracing::info!(
            target = %target.name,
            url = %target.url,
            %mode,
            planned_requests,
            "run started"
        );
        self.emit(EngineEvent::RunStarted {
            target: target.name.clone(),
            mode,
            planned_requests,
        });
    }

    fn run_finished(&self, target: &Target, mode: RunMode, result: &RunResult) {
        tracing::info!(
            target = %target.name,
            %mode,
            successful = result.successful_requests,
            failed = result.failed_requests,
            requests_per_sec = result.requests_per_sec,
            "run finished"
        );
        self.emit(EngineEvent::RunFinished {
            target: target.name.clone(),
            mode,
            successful: result.successful_requests,
            failed: result.failed_requests,
            elapsed_ms: Duration::from_secs_f64(result.total_time_sec).as_millis() as u64,
        });
    }
}

/// Wait for every worker; a panicked or aborted worker is an engine fault.
async fn join_workers(worker_set: &mut JoinSet<()>) -> Result<(), InfermeterError> {
    let mut failure = None;
    while let Some(joined) = worker_set.join_next().await {
        if let Err(e) = joined {
            tracing::error!("worker task failed: {e}");
            failure.get_or_insert_with(|| e.to_string());
        }
    }
    match failure {
        Some(e) => Err(InfermeterError::Engine(format!("worker task failed: {e}"))),
        None => Ok(()),
    }
}

fn summarize_batch(
    batch_size: usize,
    iterations: u32,
    latencies: &[f64],
    last_error: Option<String>,
) -> BatchSizeResult {
    let successful_iterations = latencies.len() as u32;
    if latencies.is_empty() {
        return BatchSizeResult {
            batch_size,
            iterations,
            successful_iterations,
            avg_latency_ms: None,
            throughput_per_sec: None,
            error: Some(last_error.unwrap_or_else(|| ALL_REQUESTS_FAILED.to_string())),
        };
    }

    let avg = latencies.iter().sum::<f64>() / latencies.len() as f64;
    let throughput = (avg > 0.0).then(|| batch_size as f64 / (avg / 1000.0));
    BatchSizeResult {
        batch_size,
        iterations,
        successful_iterations,
        avg_latency_ms: Some(avg),
        throughput_per_sec: throughput,
        error: None,
    }
}
