//! JSON persistence for trained models

use crate::config::HmmConfig;
use crate::error::{HmmError, Result};
use crate::model::GaussianHmm;
use crate::params::HmmParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// On-disk layout of a model
///
/// Only round-trip fidelity is promised, not schema stability.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredModel {
    n_states: usize,
    dim: usize,
    #[serde(flatten)]
    params: HmmParams,
    #[serde(default)]
    iterations_trained: usize,
    #[serde(default)]
    config: HmmConfig,
}

impl GaussianHmm {
    /// Serialize parameters to a JSON string
    pub fn to_json_string(&self) -> Result<String> {
        let params = self.params().ok_or(HmmError::Uninitialized)?;
        let stored = StoredModel {
            n_states: params.n_states(),
            dim: params.dim(),
            params: params.clone(),
            iterations_trained: self.iterations_trained(),
            config: *self.config(),
        };
        Ok(serde_json::to_string_pretty(&stored)?)
    }

    /// Parse and validate a model produced by [`to_json_string`](Self::to_json_string)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let stored: StoredModel = serde_json::from_str(json)?;
        if stored.n_states != stored.params.n_states() || stored.dim != stored.params.dim() {
            return Err(HmmError::InvalidParameters(format!(
                "header says {} states x {} dims, arrays are {} x {}",
                stored.n_states,
                stored.dim,
                stored.params.n_states(),
                stored.params.dim()
            )));
        }
        stored
            .params
            .validate_variance_floor(stored.config.variance_floor)?;
        Self::from_params(stored.config, stored.params, stored.iterations_trained)
    }

    /// Write the model to `path` as JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, json)?;
        debug!("Saved HMM to {}", path.display());
        Ok(())
    }

    /// Load a model written by [`save_json`](Self::save_json)
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let model = Self::from_json_str(&json)?;
        debug!(
            "Loaded {}-state HMM from {}",
            model.n_states(),
            path.display()
        );
        Ok(model)
    }
}
