// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the model repository on disk:
//
//   checkpoint.rs       — checkpoint-<tag> records via CompactRecorder
//   metrics.rs          — iteration,metric,value rows in metrics.csv
//   model_repository.rs — graph.json / graph.mpk / corresp.txt,
//                         the ModelAccessor used by the service
//   tokenizer_store.rs  — word-level tokenizer.json build and load

pub mod checkpoint;
pub mod metrics;
pub mod model_repository;
pub mod tokenizer_store;
