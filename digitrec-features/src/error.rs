//! Error types for feature extraction

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Audio loading error: {0}")]
    AudioLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeatureError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn audio_load<S: Into<String>>(msg: S) -> Self {
        Self::AudioLoad(msg.into())
    }
}
