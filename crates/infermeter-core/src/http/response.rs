use serde::{Deserialize, Serialize};

/// Body returned by `GET /health`.
///
/// Only the status code gates readiness; the body is decoded on a best-effort
/// basis for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}
