//! Digitrec feature extraction
//!
//! Turns a raw waveform into a sequence of mel-frequency cepstral
//! coefficient vectors, one per 25ms frame. Pitch tracking and LPC
//! formant analysis are available for inspecting recordings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use digitrec_features::{FeatureConfig, MfccExtractor, Waveform};
//!
//! let waveform = Waveform::from_file("recordings/7/take_01.wav")?;
//! let extractor = MfccExtractor::new(FeatureConfig::default(), waveform.sample_rate())?;
//!
//! let features = extractor.extract(&waveform)?;
//! println!("{} frames x {} coefficients", features.nrows(), features.ncols());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
pub mod error;
pub mod lpc;
pub mod mfcc;
pub mod pitch;
pub mod preprocess;

pub use audio::Waveform;
pub use error::{FeatureError, Result};
pub use lpc::{LpcAnalyzer, LpcCoefficients};
pub use mfcc::{extract_features, FeatureConfig, FeatureSequence, MfccExtractor};
pub use pitch::{estimate_pitch, PitchConfig, PitchTrack, PitchTracker};
pub use preprocess::{FrameConfig, FrameGeometry};
