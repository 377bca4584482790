//! Error types for the bodyfit engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No body-model description was found at startup. Permanent for the
    /// lifetime of the process.
    #[error("Body model unavailable: no model description was found at startup")]
    ModelUnavailable,

    #[error("Model loading error: {0}")]
    ModelLoad(String),

    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    #[error("Incomplete keypoint set: expected {expected}, got {actual}")]
    IncompleteKeypoints { expected: usize, actual: usize },

    #[error("Mask dimensions {mask_width}x{mask_height} do not match image {image_width}x{image_height}")]
    MaskDimensions {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Numeric divergence at iteration {iteration}: {detail}")]
    NumericDivergence { iteration: usize, detail: String },

    #[error("Measurement computation failed: {0}")]
    ComputationFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Whether the error was raised while validating inputs, before any
    /// optimization work started.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidObservation(_)
                | Error::IncompleteKeypoints { .. }
                | Error::MaskDimensions { .. }
        )
    }
}
