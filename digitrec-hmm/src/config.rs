//! Model and training configuration

use crate::error::{HmmError, Result};
use serde::{Deserialize, Serialize};

/// Variance floor applied after every re-estimation and added at seeding
pub const VARIANCE_FLOOR: f64 = 1e-4;

/// Variance floor applied when evaluating emission densities
pub const EMISSION_VARIANCE_FLOOR: f64 = 1e-5;

/// Added to every M-step denominator
pub const DENOMINATOR_EPSILON: f64 = 1e-10;

/// Gaussian HMM configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmmConfig {
    /// Number of hidden states (default: 5)
    pub n_states: usize,
    /// Baum-Welch iterations per training call (default: 5)
    pub n_iter: usize,
    /// Floor for re-estimated variances, added to seeded ones (default: 1e-4)
    pub variance_floor: f64,
    /// Floor for variances inside the density (default: 1e-5)
    pub emission_variance_floor: f64,
    /// Added to M-step denominators (default: 1e-10)
    pub denominator_epsilon: f64,
}

impl Default for HmmConfig {
    fn default() -> Self {
        Self {
            n_states: 5,
            n_iter: 5,
            variance_floor: VARIANCE_FLOOR,
            emission_variance_floor: EMISSION_VARIANCE_FLOOR,
            denominator_epsilon: DENOMINATOR_EPSILON,
        }
    }
}

impl HmmConfig {
    /// Create config with the given state count
    pub fn with_states(n_states: usize) -> Self {
        Self {
            n_states,
            ..Default::default()
        }
    }

    /// Set iteration count
    pub fn iterations(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Set the re-estimation variance floor
    pub fn variance_floor(mut self, floor: f64) -> Self {
        self.variance_floor = floor;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.n_states == 0 {
            return Err(HmmError::config("n_states must be positive"));
        }

        if !(self.variance_floor > 0.0 && self.variance_floor.is_finite()) {
            return Err(HmmError::config("variance_floor must be positive"));
        }

        if !(self.emission_variance_floor > 0.0 && self.emission_variance_floor.is_finite()) {
            return Err(HmmError::config("emission_variance_floor must be positive"));
        }

        if !(self.denominator_epsilon >= 0.0 && self.denominator_epsilon.is_finite()) {
            return Err(HmmError::config("denominator_epsilon must be non-negative"));
        }

        Ok(())
    }
}

/// Per-call training options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingOptions {
    /// Baum-Welch iterations to run
    pub n_iter: usize,
    /// Continue from existing parameters instead of re-seeding
    ///
    /// A model without parameters is always seeded first.
    pub resume: bool,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            n_iter: HmmConfig::default().n_iter,
            resume: true,
        }
    }
}

impl TrainingOptions {
    pub fn iterations(n_iter: usize) -> Self {
        Self {
            n_iter,
            ..Default::default()
        }
    }

    /// Discard existing parameters and seed again from the data
    pub fn fresh(mut self) -> Self {
        self.resume = false;
        self
    }
}
