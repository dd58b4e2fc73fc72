//! Error types for HMM operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HmmError>;

#[derive(Error, Debug)]
pub enum HmmError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Feature dimension mismatch: model expects {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Model has no parameters yet; initialize or train it first")]
    Uninitialized,

    #[error("Observation sequence is empty")]
    EmptySequence,

    #[error("No usable training sequences")]
    NoTrainingData,

    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HmmError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn invalid_parameters<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameters(msg.into())
    }

    /// True for failures that make a single model unable to score an input
    /// (the classifier treats these as a `-inf` score)
    pub fn is_scoring_failure(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::Uninitialized | Self::EmptySequence
        )
    }
}

impl From<serde_json::Error> for HmmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
