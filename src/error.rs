// ============================================================
// Error Types
// ============================================================
// Every library layer returns `crate::error::Result<T>`.
// Only the CLI layer converts into anyhow::Error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Split fractions outside [0, 1] or start > stop
    #[error("invalid split range [{start}, {stop})")]
    InvalidRange { start: f64, stop: f64 },

    #[error("empty dataset: {0}")]
    EmptyDataset(&'static str),

    #[error("batch has no target tensors but labels are required")]
    MissingLabel,

    #[error("graph returned an unexpected output type: {0}")]
    UnexpectedOutputType(&'static str),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An example (or a batch of examples) disagrees on the number of tensor slots
    #[error("{what} arity mismatch: expected {expected}, found {found}")]
    ArityMismatch {
        what:     &'static str,
        expected: usize,
        found:    usize,
    },

    #[error("slot {slot}: cannot stack {found} onto {expected}")]
    ShapeMismatch {
        slot:     usize,
        expected: String,
        found:    String,
    },

    #[error("label {label} is outside 0..{nclasses}")]
    LabelOutOfRange { label: i64, nclasses: usize },

    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Status code reported to the caller of the service.
    pub fn status_code(&self) -> i32 {
        match self {
            Error::Configuration(_) | Error::InvalidRange { .. } | Error::InvalidInput(_) => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_parameters_map_to_400() {
        assert_eq!(Error::Configuration("x".into()).status_code(), 400);
        assert_eq!(Error::InvalidRange { start: 0.5, stop: 0.1 }.status_code(), 400);
        assert_eq!(Error::MissingLabel.status_code(), 500);
    }
}
