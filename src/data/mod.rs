// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From request items to stacked host tensors:
//
//   request data items
//       │
//       ▼
//   input.rs        → Image / Text connectors (tokenizer, pixels)
//       │             preprocessor.rs cleans text first
//       ▼
//   store.rs        → ExampleStore: append-only (inputs, targets)
//       │
//       ├── splitter.rs → contiguous train / held-out views
//       ▼
//   sampler.rs      → BatchSampler: permutation + slot stacking
//       │
//       ▼
//   example.rs      → Example / Batch / stack()
//
// Tensors stay on the host (burn TensorData) until the
// ml layer moves a batch to the device.

pub mod example;
pub mod input;
pub mod preprocessor;
pub mod sampler;
pub mod splitter;
pub mod store;
