// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
// Everything that runs tensors on a device:
//
//   graph.rs      — Graph trait, GraphOutput, the ModelAccessor
//                   seam, and the IdentityGraph / TextEncoderGraph
//                   implementations
//
//   encoder.rs    — self-attention EncoderBlock stack used by
//                   TextEncoderGraph when num_layers > 0
//
//   module.rs     — GraphModule: graph + optional classification
//                   head, parameter enumeration, checkpoints,
//                   Resettable / deep_copy
//
//   trainer.rs    — Controller state machine: MSE on one-hot
//                   targets, ADAM / ADAMW / SGD, periodic
//                   evaluation and checkpoints
//
//   evaluator.rs  — accuracy over a store
//
//   inferencer.rs — softmax + top-k prediction records

pub mod encoder;
pub mod evaluator;
pub mod graph;
pub mod inferencer;
pub mod module;
pub mod trainer;
