pub mod client;
pub mod request;
pub mod response;

pub use client::{PredictClient, PredictClientBuilder};
pub use request::{BatchPredictRequest, PredictRequest};
pub use response::HealthResponse;

pub const PATH_PREDICT: &str = "/predict";
pub const PATH_PREDICT_BATCH: &str = "/predict/batch";
pub const PATH_HEALTH: &str = "/health";
