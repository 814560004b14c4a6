use serde::Serialize;

/// Body of `POST /predict`. Borrows the sample so the shared pool is never
/// cloned per request.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PredictRequest<'a> {
    pub features: &'a [f32],
}

/// Body of `POST /predict/batch`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchPredictRequest<'a> {
    pub features: &'a [Vec<f32>],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_request_wire_shape() {
        let features = [1.0_f32, 2.5];
        let json = serde_json::to_value(PredictRequest {
            features: &features,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"features": [1.0, 2.5]}));
    }

    #[test]
    fn batch_request_wire_shape() {
        let batch = vec![vec![1.0_f32], vec![2.0, 3.0]];
        let json = serde_json::to_value(BatchPredictRequest { features: &batch }).unwrap();
        assert_eq!(json, serde_json::json!({"features": [[1.0], [2.0, 3.0]]}));
    }
}
