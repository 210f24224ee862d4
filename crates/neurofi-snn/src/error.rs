//! Errors from the numeric backend.

use thiserror::Error;

/// Errors from network construction and evaluation.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Shape mismatch at stage '{stage}': expected {expected}, got {got}")]
    ShapeMismatch {
        stage: String,
        expected: String,
        got: String,
    },

    #[error("Stage index {index} out of range for network of {len} stages")]
    StageIndex { index: usize, len: usize },

    #[error("Unknown neuron parameter '{0}'")]
    UnknownParam(String),

    #[error("Layer '{0}' is not registered in the topology")]
    UnknownLayer(String),

    #[error("Network has no stages")]
    EmptyNetwork,
}
