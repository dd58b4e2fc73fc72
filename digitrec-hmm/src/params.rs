//! HMM parameter set and its data-driven seeding

use crate::config::HmmConfig;
use crate::error::{HmmError, Result};
use crate::logmath::ln_or_neg_inf;
use crate::report::{DegenerateKind, DegenerateState};
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Tolerance for probability rows summing to one
pub const STOCHASTIC_TOLERANCE: f64 = 1e-6;

/// Parameters of a diagonal-Gaussian HMM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmParams {
    /// Initial state distribution (n_states)
    pub pi: Array1<f64>,
    /// Row-stochastic transition matrix (n_states, n_states)
    pub transition: Array2<f64>,
    /// Per-state means (n_states, dim)
    pub means: Array2<f64>,
    /// Per-state diagonal variances (n_states, dim)
    pub variances: Array2<f64>,
}

impl HmmParams {
    /// Seed parameters from training data
    ///
    /// All frames are concatenated and split into `n_states` contiguous
    /// chunks (the first `len % n_states` chunks get one extra frame). Each
    /// state takes its chunk's mean and its population variance plus
    /// `variance_floor`; `pi` and
    /// the transition matrix start uniform. A state whose chunk is empty
    /// (fewer frames than states) gets the global mean and unit variance.
    pub fn seed(
        sequences: &[ArrayView2<f64>],
        config: &HmmConfig,
    ) -> Result<(Self, Vec<DegenerateState>)> {
        let n_states = config.n_states;
        if sequences.is_empty() {
            return Err(HmmError::NoTrainingData);
        }

        let all_frames = concatenate(Axis(0), sequences)
            .map_err(|e| HmmError::invalid_parameters(format!("cannot stack sequences: {}", e)))?;
        let (n_frames, dim) = all_frames.dim();
        if n_frames == 0 {
            return Err(HmmError::NoTrainingData);
        }

        let global_mean = all_frames
            .mean_axis(Axis(0))
            .ok_or(HmmError::NoTrainingData)?;

        let mut means = Array2::zeros((n_states, dim));
        let mut variances = Array2::ones((n_states, dim));
        let mut degenerate = Vec::new();

        let base = n_frames / n_states;
        let extra = n_frames % n_states;
        let mut start = 0;

        for state in 0..n_states {
            let len = base + usize::from(state < extra);
            let chunk = all_frames.slice(ndarray::s![start..start + len, ..]);
            start += len;

            match chunk.mean_axis(Axis(0)) {
                Some(mean) => {
                    means.row_mut(state).assign(&mean);
                    let var = chunk
                        .var_axis(Axis(0), 0.0)
                        .mapv(|v| v + config.variance_floor);
                    variances.row_mut(state).assign(&var);
                }
                None => {
                    means.row_mut(state).assign(&global_mean);
                    variances
                        .row_mut(state)
                        .fill(1.0_f64.max(config.variance_floor));
                    degenerate.push(DegenerateState::new(state, DegenerateKind::EmptyInitChunk));
                }
            }
        }

        let uniform = 1.0 / n_states as f64;
        let params = Self {
            pi: Array1::from_elem(n_states, uniform),
            transition: Array2::from_elem((n_states, n_states), uniform),
            means,
            variances,
        };

        Ok((params, degenerate))
    }

    pub fn n_states(&self) -> usize {
        self.pi.len()
    }

    /// Feature dimensionality D
    pub fn dim(&self) -> usize {
        self.means.ncols()
    }

    pub fn log_pi(&self) -> Array1<f64> {
        self.pi.mapv(ln_or_neg_inf)
    }

    pub fn log_transition(&self) -> Array2<f64> {
        self.transition.mapv(ln_or_neg_inf)
    }

    /// Check shapes, stochastic rows and strictly positive variances
    pub fn validate(&self) -> Result<()> {
        let n = self.n_states();
        if n == 0 {
            return Err(HmmError::invalid_parameters("model has no states"));
        }
        if self.transition.dim() != (n, n) {
            return Err(HmmError::InvalidParameters(format!(
                "transition shape {:?}, expected ({}, {})",
                self.transition.dim(),
                n,
                n
            )));
        }
        if self.means.nrows() != n || self.variances.dim() != self.means.dim() {
            return Err(HmmError::InvalidParameters(format!(
                "means {:?} / variances {:?} do not match {} states",
                self.means.dim(),
                self.variances.dim(),
                n
            )));
        }
        if self.dim() == 0 {
            return Err(HmmError::invalid_parameters("feature dimension is zero"));
        }

        let pi_sum = self.pi.sum();
        if (pi_sum - 1.0).abs() > STOCHASTIC_TOLERANCE {
            return Err(HmmError::InvalidParameters(format!(
                "initial probabilities sum to {}",
                pi_sum
            )));
        }
        for (i, row) in self.transition.axis_iter(Axis(0)).enumerate() {
            let row_sum = row.sum();
            if (row_sum - 1.0).abs() > STOCHASTIC_TOLERANCE {
                return Err(HmmError::InvalidParameters(format!(
                    "transition row {} sums to {}",
                    i, row_sum
                )));
            }
        }
        if self.pi.iter().chain(self.transition.iter()).any(|&p| p < 0.0) {
            return Err(HmmError::invalid_parameters("negative probability"));
        }
        if self.means.iter().any(|m| !m.is_finite()) {
            return Err(HmmError::invalid_parameters("non-finite mean"));
        }
        if self.variances.iter().any(|&v| !(v > 0.0 && v.is_finite())) {
            return Err(HmmError::invalid_parameters("variance must be positive and finite"));
        }

        Ok(())
    }

    /// Check that no variance sits below `floor`
    pub fn validate_variance_floor(&self, floor: f64) -> Result<()> {
        match self.variances.indexed_iter().find(|(_, v)| **v < floor) {
            Some(((state, dim), v)) => Err(HmmError::InvalidParameters(format!(
                "variance {} at state {} dim {} is below the floor {}",
                v, state, dim, floor
            ))),
            None => Ok(()),
        }
    }
}
