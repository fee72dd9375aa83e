// ============================================================
// Layer 3 — Request Parameters
// ============================================================
// Typed view over the generic nested parameter object:
//
//   { "parameters": { "input":  {...},
//                     "mllib":  { "solver": {...}, "net": {...} },
//                     "output": { "best": k, "measure": [...] } },
//     "data": [ ... ] }
//
// Every field is optional and falls back to the defaults below.
// `data` items stay untyped here; each input connector parses
// its own item shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiRequest {
    pub parameters: Parameters,
    pub data:       Vec<Value>,
}

impl ApiRequest {
    /// Parse and validate a request object.
    pub fn from_value(value: Value) -> Result<Self> {
        let request: ApiRequest = serde_json::from_value(value)
            .map_err(|e| Error::Configuration(e.to_string()))?;
        request.parameters.validate()?;
        Ok(request)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Self::from_value(value)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub input:  InputParams,
    pub mllib:  MllibParams,
    pub output: OutputParams,
}

impl Parameters {
    fn validate(&self) -> Result<()> {
        let solver = &self.mllib.solver;
        let net    = &self.mllib.net;

        let positive = [
            ("net.batch_size", net.batch_size),
            ("net.test_batch_size", net.test_batch_size),
            ("solver.test_interval", solver.test_interval),
            ("solver.display", solver.display),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(Error::Configuration(format!("{name} must be at least 1")));
        }
        if !(solver.base_lr.is_finite() && solver.base_lr > 0.0) {
            return Err(Error::Configuration("solver.base_lr must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.input.test_split) {
            return Err(Error::Configuration("input.test_split must lie in [0, 1)".into()));
        }
        if self.mllib.nclasses == Some(0) {
            return Err(Error::Configuration("mllib.nclasses must be at least 1".into()));
        }
        Ok(())
    }
}

// ─── input ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputParams {
    /// Padded token sequence length for text inputs
    pub sequence: usize,
    /// Fraction of the transformed data held out for evaluation
    pub test_split: f64,
}

impl Default for InputParams {
    fn default() -> Self {
        Self { sequence: 500, test_split: 0.0 }
    }
}

// ─── mllib ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MllibParams {
    pub gpu:        bool,
    pub nclasses:   Option<usize>,
    /// Attach a trainable classification head after the graph
    pub finetuning: bool,
    /// Seed for the per-iteration shuffles; clock-seeded when absent
    pub seed:       Option<u64>,
    pub solver:     SolverParams,
    pub net:        NetParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub iterations:    usize,
    pub solver_type:   String,
    pub base_lr:       f64,
    /// Evaluate every N iterations
    pub test_interval: usize,
    /// Checkpoint every N iterations; 0 disables
    pub snapshot:      usize,
    /// Log the loss every N batches
    pub display:       usize,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            iterations:    100,
            solver_type:   "ADAM".to_string(),
            base_lr:       0.0001,
            test_interval: 1,
            snapshot:      0,
            display:       20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetParams {
    pub batch_size:      usize,
    pub test_batch_size: usize,
}

impl Default for NetParams {
    fn default() -> Self {
        Self { batch_size: 5, test_batch_size: 1 }
    }
}

// ─── output ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    /// Number of top categories reported per example
    pub best:    Option<usize>,
    /// Requested measures; presence switches predict to evaluation
    pub measure: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_when_fields_absent() {
        let req = ApiRequest::from_value(json!({})).unwrap();
        let solver = &req.parameters.mllib.solver;

        assert_eq!(solver.iterations, 100);
        assert_eq!(solver.solver_type, "ADAM");
        assert_eq!(solver.base_lr, 0.0001);
        assert_eq!(solver.test_interval, 1);
        assert_eq!(solver.snapshot, 0);
        assert_eq!(solver.display, 20);
        assert_eq!(req.parameters.mllib.net.batch_size, 5);
        assert_eq!(req.parameters.mllib.net.test_batch_size, 1);
        assert!(req.parameters.output.best.is_none());
    }

    #[test]
    fn test_nested_fields_are_read() {
        let req = ApiRequest::from_value(json!({
            "parameters": {
                "mllib":  { "nclasses": 3, "solver": { "iterations": 7, "base_lr": 0.01 } },
                "output": { "best": 2, "measure": ["acc"] }
            },
            "data": [ { "id": "a", "text": "hello" } ]
        }))
        .unwrap();

        assert_eq!(req.parameters.mllib.nclasses, Some(3));
        assert_eq!(req.parameters.mllib.solver.iterations, 7);
        assert_eq!(req.parameters.mllib.solver.base_lr, 0.01);
        assert_eq!(req.parameters.output.best, Some(2));
        assert_eq!(req.data.len(), 1);
    }

    #[test]
    fn test_malformed_field_is_configuration_error() {
        let err = ApiRequest::from_value(json!({
            "parameters": { "mllib": { "solver": { "iterations": "many" } } }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = ApiRequest::from_value(json!({
            "parameters": { "mllib": { "net": { "batch_size": 0 } } }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
