// ============================================================
// Layer 2 — Application
// ============================================================
// Workflow coordination only; no tensor math here.
//
//   service.rs — init / train / predict over injected input,
//                output and model components
//   output.rs  — the supervised OutputFormatter

pub mod output;
pub mod service;
