//! Error types for classification, model sets and corpora

use digitrec_features::FeatureError;
use digitrec_hmm::HmmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClassifierError>;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Feature extraction failed: {0}")]
    Feature(#[from] FeatureError),

    #[error("HMM error: {0}")]
    Hmm(#[from] HmmError),

    #[error("Model set is empty")]
    NoModels,

    #[error("Every model rejected the input")]
    NoViableModel,

    #[error("Invalid digit label: {0}")]
    InvalidDigit(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassifierError {
    pub fn corpus<S: Into<String>>(msg: S) -> Self {
        Self::Corpus(msg.into())
    }
}
