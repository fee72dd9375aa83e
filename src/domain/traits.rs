// ============================================================
// Layer 3 — Core Traits
// ============================================================
// Seams of the service: how requests become examples and how
// results become responses. The model side of the service is
// `ml::graph::ModelAccessor`.

use crate::data::store::ExampleStore;
use crate::domain::request::{ApiRequest, OutputParams};
use crate::domain::response::{MeasureHistory, Measures, PredictionRecord, Response};
use crate::error::Result;

/// Examples built from a request, with one source id per example
/// in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TransformedInput {
    pub store: ExampleStore,
    pub ids:   Vec<String>,
}

/// Turns a request's `data` into tensorised examples.
pub trait InputTransform {
    fn transform(&self, request: &ApiRequest) -> Result<TransformedInput>;
}

/// Assembles the caller-facing response.
pub trait OutputFormatter {
    fn predictions(&self, records: Vec<PredictionRecord>, params: &OutputParams) -> Response;

    fn measures(&self, measures: Measures, history: Option<MeasureHistory>) -> Response;
}
