//! Diagonal-Gaussian hidden Markov models
//!
//! One model per vocabulary word, trained with log-domain Baum-Welch on a
//! batch of MFCC sequences and scored with the forward algorithm.
//!
//! ## Example
//!
//! ```no_run
//! use digitrec_hmm::{GaussianHmm, HmmConfig, TrainingOptions};
//! use ndarray::Array2;
//!
//! # fn main() -> digitrec_hmm::Result<()> {
//! let sequences: Vec<Array2<f64>> = vec![/* (frames, 12) feature matrices */];
//!
//! let mut hmm = GaussianHmm::new(HmmConfig::with_states(5))?;
//! let report = hmm.train(&sequences, TrainingOptions::iterations(5))?;
//! println!("final log-likelihood: {:?}", report.final_log_likelihood());
//!
//! // Further calls keep refining the same parameters
//! hmm.train(&sequences, TrainingOptions::iterations(2))?;
//!
//! let score = hmm.score(sequences[0].view())?;
//! # Ok(())
//! # }
//! ```

pub mod baum_welch;
pub mod config;
pub mod error;
pub mod gaussian;
pub mod inference;
pub mod logmath;
pub mod model;
pub mod params;
pub mod persist;
pub mod report;

pub use config::{HmmConfig, TrainingOptions};
pub use error::{HmmError, Result};
pub use model::{GaussianHmm, ModelStage};
pub use params::HmmParams;
pub use report::{DegenerateKind, DegenerateState, TrainingReport};
