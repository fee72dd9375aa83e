// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// The service's vocabulary, free of device code:
//
//   request.rs  — typed request parameters with defaults
//   response.rs — prediction records, measures, status
//   traits.rs   — InputTransform / OutputFormatter seams

pub mod request;
pub mod response;
pub mod traits;
