use thiserror::Error;

use sentiforge_core::SentiError;

/// Errors that can occur while assembling, training or running a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model has no layers.
    #[error("model has no layers")]
    EmptyModel,

    /// A layer is misconfigured or does not fit the previous layer's output.
    #[error("layer {index} is invalid: {reason}")]
    InvalidLayer {
        /// Zero-based position in the layer stack.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The requested optimizer, loss or metric is not available.
    #[error("unsupported {kind}: {name:?}")]
    Unsupported {
        /// "optimizer", "loss" or "metric".
        kind: &'static str,
        /// The requested name.
        name: String,
    },

    /// A training option is out of range.
    #[error("invalid training option: {0}")]
    InvalidOption(String),

    /// A preprocessing error, e.g. an empty train split.
    #[error(transparent)]
    Pipeline(#[from] SentiError),

    /// Candle ML framework error.
    #[error("ML framework error: {0}")]
    Candle(#[from] candle_core::Error),

    /// An I/O operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Model metadata could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type alias for trainer operations.
pub type Result<T> = std::result::Result<T, ModelError>;
