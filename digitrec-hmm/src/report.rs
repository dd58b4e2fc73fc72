//! Training outcome reporting

use serde::{Deserialize, Serialize};

/// What went numerically wrong with a state during training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateKind {
    /// State had (near) zero occupancy across all sequences
    Unoccupied,
    /// `dims` variance components were clamped to the floor
    VarianceFloored { dims: usize },
    /// Transition row had no mass and was reset to uniform
    TransitionRowReset,
    /// Seeding chunk was empty (fewer frames than states)
    EmptyInitChunk,
}

/// A degenerate state observed during a training call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegenerateState {
    pub state: usize,
    pub kind: DegenerateKind,
    /// Iteration (1-based) that produced it; `None` for seeding
    pub iteration: Option<usize>,
}

impl DegenerateState {
    pub fn new(state: usize, kind: DegenerateKind) -> Self {
        Self {
            state,
            kind,
            iteration: None,
        }
    }

    pub fn at_iteration(mut self, iteration: usize) -> Self {
        self.iteration = Some(iteration);
        self
    }
}

/// Summary of one `train` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Re-estimation iterations completed
    pub iterations: usize,
    /// Total log-likelihood of the batch, measured in each iteration's E-step
    pub log_likelihoods: Vec<f64>,
    /// Sequences that contributed to the accumulators
    pub sequences_used: usize,
    /// Empty or non-finite sequences that were left out
    pub sequences_skipped: usize,
    pub degenerate: Vec<DegenerateState>,
    /// Whether this call seeded the parameters
    pub seeded: bool,
}

impl TrainingReport {
    /// Log-likelihood of the last completed iteration
    pub fn final_log_likelihood(&self) -> Option<f64> {
        self.log_likelihoods.last().copied()
    }

    pub fn has_degenerate_states(&self) -> bool {
        !self.degenerate.is_empty()
    }
}
