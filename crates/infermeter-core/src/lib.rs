pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod readiness;
pub mod results;
pub mod samples;
pub mod session;

pub use config::{HarnessConfig, Target};
pub use engine::{EngineEvent, Harness};
pub use error::InfermeterError;
pub use samples::SampleSet;
