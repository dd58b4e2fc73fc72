//! Maximum-likelihood digit classification over a model set

use crate::digit::Digit;
use crate::error::{ClassifierError, Result};
use crate::model_set::ModelSet;
use ndarray::ArrayView2;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Outcome of classifying one feature sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Highest-scoring digit
    pub label: Digit,
    /// Log-likelihood under every model; `-inf` where scoring failed
    pub scores: BTreeMap<Digit, f64>,
}

impl Classification {
    /// Score of the winning model
    pub fn best_score(&self) -> f64 {
        self.scores
            .get(&self.label)
            .copied()
            .unwrap_or(f64::NEG_INFINITY)
    }

    /// Models that could not score the input
    pub fn rejected(&self) -> impl Iterator<Item = Digit> + '_ {
        self.scores
            .iter()
            .filter(|(_, s)| **s == f64::NEG_INFINITY)
            .map(|(&d, _)| d)
    }
}

/// Scores a feature sequence against every digit model
#[derive(Debug, Clone)]
pub struct DigitClassifier {
    models: ModelSet,
}

impl DigitClassifier {
    pub fn new(models: ModelSet) -> Result<Self> {
        if models.is_empty() {
            return Err(ClassifierError::NoModels);
        }
        Ok(Self { models })
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Pick the digit whose model gives the highest log-likelihood
    ///
    /// A model that fails to score (dimension mismatch, empty input, no
    /// parameters) contributes `-inf` and is logged; the others still
    /// compete. Ties go to the lowest digit. Fails with `NoViableModel` when
    /// every score is `-inf`.
    pub fn classify(&self, features: ArrayView2<f64>) -> Result<Classification> {
        let mut scores = BTreeMap::new();
        let mut best: Option<(Digit, f64)> = None;

        for (digit, model) in self.models.iter() {
            let score = match model.score(features) {
                Ok(score) => score,
                Err(e) => {
                    warn!("Model {} could not score input: {}", digit, e);
                    f64::NEG_INFINITY
                }
            };
            scores.insert(digit, score);

            // Strict comparison keeps the first (lowest) digit on ties; NaN never wins
            let improves = match best {
                None => score > f64::NEG_INFINITY,
                Some((_, best_score)) => score > best_score,
            };
            if improves {
                best = Some((digit, score));
            }
        }

        let (label, score) = best.ok_or(ClassifierError::NoViableModel)?;
        debug!("Classified as {} (log-likelihood {:.3})", label, score);
        Ok(Classification { label, scores })
    }
}
