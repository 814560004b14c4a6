use std::path::Path;

use serde::Deserialize;

use crate::error::InfermeterError;

/// On-disk shape of the test data document.
#[derive(Debug, Deserialize)]
struct TestDataFile {
    samples: Vec<Vec<f32>>,
}

/// Fixed pool of feature vectors replayed against a target.
///
/// Loaded once at startup and never mutated afterwards; shared between
/// workers behind an `Arc`. Feature width is not checked.
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Vec<Vec<f32>>,
}

impl SampleSet {
    /// Build a pool from in-memory vectors. An empty pool is rejected since
    /// round-robin selection over it is undefined.
    pub fn new(samples: Vec<Vec<f32>>) -> Result<Self, InfermeterError> {
        if samples.is_empty() {
            return Err(InfermeterError::DataSet(
                "test data contains no samples".to_string(),
            ));
        }
        Ok(Self { samples })
    }

    /// Parse a `{"samples": [[...], ...]}` document.
    pub fn from_json_str(content: &str) -> Result<Self, InfermeterError> {
        let file: TestDataFile = serde_json::from_str(content)
            .map_err(|e| InfermeterError::DataSet(format!("malformed test data: {e}")))?;
        Self::new(file.samples)
    }

    /// Read and parse the test data file at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, InfermeterError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            InfermeterError::DataSet(format!("cannot read {}: {e}", path.display()))
        })?;
        let set = Self::from_json_str(&content)?;
        tracing::info!(
            path = %path.display(),
            samples = set.len(),
            "loaded test data"
        );
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample for request `index`, wrapping around the pool.
    pub fn round_robin(&self, index: usize) -> &[f32] {
        &self.samples[index % self.samples.len()]
    }

    /// The first `count` samples, truncated to the pool size.
    pub fn front(&self, count: usize) -> &[Vec<f32>] {
        &self.samples[..count.min(self.samples.len())]
    }
}
