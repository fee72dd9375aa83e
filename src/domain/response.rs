// ============================================================
// Layer 3 — Results and Responses
// ============================================================
// One PredictionRecord per input example:
//   uri      — source identifier supplied by the input connector
//   loss     — placeholder, always 0.0 for predictions
//   cats     — top-k labels, best first
//   probs    — matching probabilities (same order and length)
//   nclasses — width of the model output
//
// A Response wraps records or measures with a status code
// (0 = success).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub uri:      String,
    pub loss:     f64,
    pub cats:     Vec<String>,
    pub probs:    Vec<f64>,
    pub nclasses: usize,
}

/// Named scalar measures, e.g. `acc`.
pub type Measures = BTreeMap<String, f64>;

/// Per-iteration history of each measure.
pub type MeasureHistory = BTreeMap<String, Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg:  Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub predictions:  Vec<PredictionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure:      Option<Measures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure_hist: Option<MeasureHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub body:   ResponseBody,
}

impl Response {
    pub fn success(body: ResponseBody) -> Self {
        Self {
            status: Status { code: 0, msg: None },
            body,
        }
    }

    /// Failure response carrying the error message.
    pub fn failure(error: &Error) -> Self {
        Self {
            status: Status {
                code: error.status_code(),
                msg:  Some(error.to_string()),
            },
            body: ResponseBody::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_message_and_code() {
        let resp = Response::failure(&Error::MissingLabel);
        assert!(!resp.is_success());
        assert_eq!(resp.status.code, 500);
        assert!(resp.status.msg.unwrap().contains("target"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let json = serde_json::to_value(Response::success(ResponseBody::default())).unwrap();
        assert_eq!(json["status"]["code"], 0);
        assert!(json["body"].get("predictions").is_none());
        assert!(json["body"].get("measure").is_none());
    }
}
