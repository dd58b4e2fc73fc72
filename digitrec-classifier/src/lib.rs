//! Isolated spoken-digit recognition
//!
//! Ten diagonal-Gaussian HMMs, one per digit, each trained on MFCC sequences
//! of its own recordings. A recording is labelled with the digit whose model
//! assigns it the highest log-likelihood.
//!
//! ```no_run
//! use digitrec_classifier::{DigitClassifier, DigitCorpus, FeaturePipeline, ModelSet};
//! use digitrec_features::FeatureConfig;
//! use digitrec_hmm::HmmConfig;
//!
//! # fn main() -> digitrec_classifier::Result<()> {
//! let corpus = DigitCorpus::scan("data")?;
//! let split = corpus.split(30, 20);
//!
//! let mut pipeline = FeaturePipeline::new(FeatureConfig::default())?;
//! let training = pipeline.load_labelled(&split.train);
//! let (models, _reports) = ModelSet::train(&training, &HmmConfig::default())?;
//!
//! let classifier = DigitClassifier::new(models)?;
//! let features = pipeline.extract_file("data/7/sample.wav")?;
//! println!("{}", classifier.classify(features.view())?.label);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod corpus;
pub mod digit;
pub mod error;
pub mod evaluate;
pub mod model_set;

pub use classifier::{Classification, DigitClassifier};
pub use corpus::{CorpusSplit, DigitCorpus, FeaturePipeline};
pub use digit::Digit;
pub use error::{ClassifierError, Result};
pub use evaluate::{evaluate, evaluate_files, EvaluationReport};
pub use model_set::{LabelledSequences, ModelSet};
