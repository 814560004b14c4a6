use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum InfermeterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Data set error: {0}")]
    DataSet(String),

    #[error("{name} API at {url} not ready after {waited_ms}ms: {reason}")]
    NotReady {
        name: String,
        url: String,
        waited_ms: u64,
        reason: String,
    },

    #[error("Engine error: {0}")]
    Engine(String),
}

impl Serialize for InfermeterError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Render `err` followed by each of its sources, `outer: inner: root`.
///
/// A source whose text already appears in the previous level is skipped, so
/// wrappers that repeat their inner message do not print it twice.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut previous = out.clone();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !previous.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        previous = text;
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Layer {
        msg: &'static str,
        source: Option<Box<Layer>>,
    }

    impl std::fmt::Display for Layer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.msg)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.source.as_deref().map(|l| l as _)
        }
    }

    fn layer(msg: &'static str, source: Option<Layer>) -> Layer {
        Layer {
            msg,
            source: source.map(Box::new),
        }
    }

    #[test]
    fn error_chain_includes_root_cause() {
        let err = layer(
            "error sending request",
            Some(layer(
                "tcp connect error",
                Some(layer("Connection refused (os error 111)", None)),
            )),
        );
        assert_eq!(
            error_chain(&err),
            "error sending request: tcp connect error: Connection refused (os error 111)"
        );
    }

    #[test]
    fn error_chain_skips_repeated_messages() {
        let err = layer(
            "HTTP error: error sending request",
            Some(layer("error sending request", Some(layer("timed out", None)))),
        );
        assert_eq!(
            error_chain(&err),
            "HTTP error: error sending request: timed out"
        );
    }

    #[test]
    fn validation_error_display() {
        let err = InfermeterError::Validation("total_requests must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: total_requests must be at least 1"
        );
    }

    #[test]
    fn data_set_error_display() {
        let err = InfermeterError::DataSet("no samples".to_string());
        assert_eq!(err.to_string(), "Data set error: no samples");
    }

    #[test]
    fn not_ready_error_names_target_and_wait() {
        let err = InfermeterError::NotReady {
            name: "rust".to_string(),
            url: "http://localhost:8001".to_string(),
            waited_ms: 120_000,
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "rust API at http://localhost:8001 not ready after 120000ms: connection refused"
        );
    }

    #[test]
    fn engine_error_display() {
        let err = InfermeterError::Engine("worker panicked".to_string());
        assert_eq!(err.to_string(), "Engine error: worker panicked");
    }

    #[test]
    fn io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InfermeterError = io_err.into();
        let msg = err.to_string();
        assert!(msg.contains("IO error"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn serde_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not valid json").unwrap_err();
        let err: InfermeterError = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn serialize_produces_string() {
        let err = InfermeterError::Validation("test error".to_string());
        let json = serde_json::to_string(&err).expect("serialize should succeed");
        assert_eq!(json, "\"Validation error: test error\"");
    }
}
