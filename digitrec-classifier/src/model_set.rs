//! One HMM per digit: parallel training and directory persistence

use crate::digit::Digit;
use crate::error::{ClassifierError, Result};
use digitrec_features::FeatureSequence;
use digitrec_hmm::{GaussianHmm, HmmConfig, HmmError, TrainingOptions, TrainingReport};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Feature sequences grouped by label
pub type LabelledSequences = BTreeMap<Digit, Vec<FeatureSequence>>;

/// Trained models keyed by digit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSet {
    models: BTreeMap<Digit, GaussianHmm>,
}

impl ModelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Train one model per digit, each on its own rayon task
    ///
    /// Digits with no usable sequences are skipped with a warning. The set is
    /// returned only after every task has joined.
    pub fn train(
        corpus: &LabelledSequences,
        config: &HmmConfig,
    ) -> Result<(Self, BTreeMap<Digit, TrainingReport>)> {
        config.validate()?;

        let outcomes: Vec<(Digit, digitrec_hmm::Result<(GaussianHmm, TrainingReport)>)> = corpus
            .par_iter()
            .map(|(&digit, sequences)| {
                info!(
                    "Training HMM for {} with {} samples",
                    digit,
                    sequences.len()
                );
                let outcome = GaussianHmm::new(*config).and_then(|mut hmm| {
                    let report = hmm.train(sequences, TrainingOptions::iterations(config.n_iter))?;
                    Ok((hmm, report))
                });
                (digit, outcome)
            })
            .collect();

        let mut set = Self::new();
        let mut reports = BTreeMap::new();
        for (digit, outcome) in outcomes {
            match outcome {
                Ok((hmm, report)) => {
                    set.insert(digit, hmm);
                    reports.insert(digit, report);
                }
                Err(HmmError::NoTrainingData) => warn!("No data for digit {}", digit),
                Err(e) => return Err(e.into()),
            }
        }

        for digit in Digit::ALL {
            if !corpus.contains_key(&digit) {
                warn!("No data for digit {}", digit);
            }
        }
        if set.is_empty() {
            return Err(ClassifierError::NoModels);
        }

        info!("Training complete: {} digit models", set.len());
        Ok((set, reports))
    }

    pub fn insert(&mut self, digit: Digit, model: GaussianHmm) -> Option<GaussianHmm> {
        self.models.insert(digit, model)
    }

    pub fn get(&self, digit: Digit) -> Option<&GaussianHmm> {
        self.models.get(&digit)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Digits that have a model, ascending
    pub fn digits(&self) -> impl Iterator<Item = Digit> + '_ {
        self.models.keys().copied()
    }

    /// Models in ascending digit order
    pub fn iter(&self) -> impl Iterator<Item = (Digit, &GaussianHmm)> {
        self.models.iter().map(|(&d, m)| (d, m))
    }

    /// Write `hmm_<digit>.json` for every model into `dir`
    pub fn save_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for (digit, model) in self.iter() {
            model.save_json(dir.join(digitrec_paths::model_file_name(digit.value())))?;
        }
        info!("Saved {} models to {}", self.len(), dir.display());
        Ok(())
    }

    /// Load whichever digit models exist in `dir`
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut set = Self::new();
        for digit in Digit::ALL {
            let path = dir.join(digitrec_paths::model_file_name(digit.value()));
            if path.is_file() {
                set.insert(digit, GaussianHmm::load_json(&path)?);
            }
        }

        if set.is_empty() {
            return Err(ClassifierError::NoModels);
        }
        info!("Loaded {} models from {}", set.len(), dir.display());
        Ok(set)
    }
}
