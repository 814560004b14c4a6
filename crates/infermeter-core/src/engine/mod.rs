use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod executor;
pub mod worker;

pub use aggregator::{LatencyStats, OutcomeAggregator, ProgressSnapshot};
pub use executor::Harness;

/// The four load shapes the harness can drive a target with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Sequential single predictions.
    SingleRequests,
    /// Sequential batch predictions per batch size.
    BatchRequests,
    /// A fixed set of workers, each replaying the same sample sequence.
    ConcurrentRequests,
    /// A fixed request budget spread over a bounded worker pool.
    LoadTest,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunMode::SingleRequests => "single requests",
            RunMode::BatchRequests => "batch requests",
            RunMode::ConcurrentRequests => "concurrent requests",
            RunMode::LoadTest => "load test",
        };
        write!(f, "{s}")
    }
}

/// An event emitted by the harness while a run is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A run against `target` is about to dispatch its first request.
    RunStarted {
        target: String,
        mode: RunMode,
        planned_requests: u64,
    },

    /// Periodic progress, every `progress_every` completions.
    Progress {
        target: String,
        completed: u64,
        total: u64,
        failed: u64,
        elapsed_ms: u64,
    },

    /// The run finished and its outcomes are aggregated.
    RunFinished {
        target: String,
        mode: RunMode,
        successful: u64,
        failed: u64,
        elapsed_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_mode_display() {
        assert_eq!(RunMode::SingleRequests.to_string(), "single requests");
        assert_eq!(RunMode::LoadTest.to_string(), "load test");
    }

    #[test]
    fn run_mode_serializes_snake_case() {
        let json = serde_json::to_string(&RunMode::ConcurrentRequests).unwrap();
        assert_eq!(json, "\"concurrent_requests\"");
    }

    #[test]
    fn progress_event_is_tagged() {
        let event = EngineEvent::Progress {
            target: "rust".to_string(),
            completed: 100,
            total: 1000,
            failed: 2,
            elapsed_ms: 850,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["completed"], 100);

        let parsed: EngineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}
