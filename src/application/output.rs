// ============================================================
// Layer 2 — Supervised Output
// ============================================================
// Wraps prediction records or measures into a success Response.
// Records arrive already ranked and cut to `best` by the
// inferencer.

use crate::domain::request::OutputParams;
use crate::domain::response::{MeasureHistory, Measures, PredictionRecord, Response, ResponseBody};
use crate::domain::traits::OutputFormatter;

#[derive(Debug, Clone, Copy, Default)]
pub struct SupervisedOutput;

impl OutputFormatter for SupervisedOutput {
    fn predictions(&self, records: Vec<PredictionRecord>, params: &OutputParams) -> Response {
        tracing::debug!(records = records.len(), best = ?params.best, "formatting predictions");
        Response::success(ResponseBody {
            predictions: records,
            ..ResponseBody::default()
        })
    }

    fn measures(&self, measures: Measures, history: Option<MeasureHistory>) -> Response {
        Response::success(ResponseBody {
            measure:      Some(measures),
            measure_hist: history,
            ..ResponseBody::default()
        })
    }
}
