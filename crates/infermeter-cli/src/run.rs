use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use infermeter_core::http::PredictClient;
use infermeter_core::results::export::{
    render_benchmark_summary, render_load_test_summary, write_report, BENCHMARK_RESULTS_FILE,
    LOAD_TEST_RESULTS_FILE,
};
use infermeter_core::session::{run_benchmark_comparison, run_load_test_comparison};
use infermeter_core::{EngineEvent, Harness, HarnessConfig, SampleSet};
use tokio::sync::mpsc;

use crate::cli::{Cli, Command, GlobalArgs, LoadTestArgs, ProgressFormat};
use crate::exit_codes::ExitCode;
use crate::run_error::RunError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub async fn run(cli: Cli) -> Result<ExitCode, RunError> {
    let command = cli
        .command
        .unwrap_or_else(|| Command::LoadTest(LoadTestArgs::default()));

    let config = build_config(&cli.global, &command)
        .await
        .map_err(RunError::InvalidInput)?;

    let samples = SampleSet::load(&config.data_path)
        .await
        .with_context(|| format!("loading test data from {}", config.data_path.display()))
        .map_err(RunError::InvalidInput)?;

    let client = PredictClient::builder()
        .timeout(config.request_timeout())
        .build()
        .context("building HTTP client")
        .map_err(RunError::RuntimeError)?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let harness = Harness::new(client, Arc::new(samples)).with_events(tx);
    let printer = tokio::spawn(print_events(rx, cli.global.progress));

    tracing::info!(
        baseline = %config.baseline.url,
        candidate = %config.candidate.url,
        "starting comparison"
    );

    let outcome = match command {
        Command::LoadTest(_) => {
            let report = run_load_test_comparison(&harness, &config).await;
            let path = write_report(&report, &config.output_dir, LOAD_TEST_RESULTS_FILE).await;
            (
                render_load_test_summary(&report),
                report.no_target_completed(),
                path,
            )
        }
        Command::Benchmark(_) => {
            let report = run_benchmark_comparison(&harness, &config).await;
            let path = write_report(&report, &config.output_dir, BENCHMARK_RESULTS_FILE).await;
            (
                render_benchmark_summary(&report),
                report.no_target_completed(),
                path,
            )
        }
    };

    // Dropping the harness closes the event channel so the printer drains and exits.
    drop(harness);
    let _ = printer.await;

    let (summary, no_target_completed, path) = outcome;
    println!("{summary}");

    let path: PathBuf = path
        .context("writing results")
        .map_err(RunError::RuntimeError)?;
    eprintln!("Results saved to {}", path.display());

    Ok(ExitCode::from_completion(no_target_completed))
}

async fn build_config(global: &GlobalArgs, command: &Command) -> anyhow::Result<HarnessConfig> {
    let mut config = match &global.config {
        Some(path) => HarnessConfig::load(path)
            .await
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    global.apply(&mut config);
    match command {
        Command::LoadTest(args) => args.apply(&mut config),
        Command::Benchmark(args) => args.apply(&mut config),
    }

    let problems = config.validate();
    if !problems.is_empty() {
        let list = problems
            .iter()
            .map(|p| format!("  - {p}"))
            .collect::<Vec<_>>()
            .join("\n");
        anyhow::bail!("invalid configuration:\n{list}");
    }
    Ok(config)
}

async fn print_events(mut rx: mpsc::Receiver<EngineEvent>, format: ProgressFormat) {
    while let Some(event) = rx.recv().await {
        match format {
            ProgressFormat::Off => {}
            ProgressFormat::Json => match serde_json::to_string(&event) {
                Ok(line) => eprintln!("{line}"),
                Err(e) => tracing::warn!("failed to serialize progress event: {e}"),
            },
            ProgressFormat::Human => eprintln!("{}", format_event(&event)),
        }
    }
}

fn format_event(event: &EngineEvent) -> String {
    match event {
        EngineEvent::RunStarted {
            target,
            mode,
            planned_requests,
        } => format!("[{target}] {mode}: {planned_requests} requests planned"),
        EngineEvent::Progress {
            target,
            completed,
            total,
            failed,
            elapsed_ms,
        } => format!(
            "[{target}] {completed}/{total} completed ({failed} failed, {:.1}s)",
            *elapsed_ms as f64 / 1000.0
        ),
        EngineEvent::RunFinished {
            target,
            mode,
            successful,
            failed,
            elapsed_ms,
        } => format!(
            "[{target}] {mode} finished: {successful} ok, {failed} failed in {:.2}s",
            *elapsed_ms as f64 / 1000.0
        ),
    }
}
