//! Gaussian HMM: seeding, Baum-Welch training and forward scoring

use crate::baum_welch::SufficientStats;
use crate::config::{HmmConfig, TrainingOptions};
use crate::error::{HmmError, Result};
use crate::gaussian::emission_log_likelihoods;
use crate::inference::{forward, prefix_log_likelihoods, sequence_log_likelihood, viterbi};
use crate::params::HmmParams;
use crate::report::TrainingReport;
use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Lifecycle stage of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStage {
    /// No parameters; cannot score
    Uninitialized,
    /// Seeded from data, never re-estimated
    Initialized,
    /// At least one Baum-Welch iteration applied
    Trained,
}

/// Hidden Markov model with one diagonal Gaussian per state
///
/// The transition matrix is fully connected; nothing forces left-to-right
/// progression.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianHmm {
    config: HmmConfig,
    params: Option<HmmParams>,
    iterations_trained: usize,
}

impl GaussianHmm {
    /// Create an untrained model
    pub fn new(config: HmmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            params: None,
            iterations_trained: 0,
        })
    }

    /// Wrap existing parameters (the config's state count is taken from them)
    pub fn from_params(
        config: HmmConfig,
        params: HmmParams,
        iterations_trained: usize,
    ) -> Result<Self> {
        params.validate()?;
        let config = HmmConfig {
            n_states: params.n_states(),
            ..config
        };
        config.validate()?;
        Ok(Self {
            config,
            params: Some(params),
            iterations_trained,
        })
    }

    /// Seed and train in one call
    pub fn fit(sequences: &[Array2<f64>], config: HmmConfig) -> Result<Self> {
        let mut model = Self::new(config)?;
        model.train(sequences, TrainingOptions::iterations(config.n_iter))?;
        Ok(model)
    }

    pub fn config(&self) -> &HmmConfig {
        &self.config
    }

    pub fn params(&self) -> Option<&HmmParams> {
        self.params.as_ref()
    }

    pub fn n_states(&self) -> usize {
        self.config.n_states
    }

    /// Feature dimensionality, once seeded
    pub fn dim(&self) -> Option<usize> {
        self.params.as_ref().map(HmmParams::dim)
    }

    pub fn iterations_trained(&self) -> usize {
        self.iterations_trained
    }

    pub fn stage(&self) -> ModelStage {
        match (&self.params, self.iterations_trained) {
            (None, _) => ModelStage::Uninitialized,
            (Some(_), 0) => ModelStage::Initialized,
            (Some(_), _) => ModelStage::Trained,
        }
    }

    /// Seed parameters from the data, replacing any existing ones
    pub fn initialize(&mut self, sequences: &[Array2<f64>]) -> Result<TrainingReport> {
        let (usable, skipped) = self.usable_sequences(sequences, None)?;
        let (params, degenerate) = HmmParams::seed(&usable, &self.config)?;

        for state in &degenerate {
            warn!("State {} seeded without frames ({:?})", state.state, state.kind);
        }
        debug!(
            "Seeded {} states from {} sequences ({} dims)",
            self.config.n_states,
            usable.len(),
            params.dim()
        );

        self.params = Some(params);
        self.iterations_trained = 0;

        Ok(TrainingReport {
            sequences_used: usable.len(),
            sequences_skipped: skipped,
            degenerate,
            seeded: true,
            ..Default::default()
        })
    }

    /// Run `n_iter` Baum-Welch iterations on already-seeded parameters
    ///
    /// Each iteration is an E-step over all sequences in parallel followed by
    /// one M-step. An iteration in which no sequence has a finite likelihood
    /// leaves the parameters untouched.
    pub fn reestimate(&mut self, sequences: &[Array2<f64>], n_iter: usize) -> Result<TrainingReport> {
        let expected_dim = self.dim().ok_or(HmmError::Uninitialized)?;
        let (usable, skipped) = self.usable_sequences(sequences, Some(expected_dim))?;

        let config = self.config;
        let params = self.params.as_mut().ok_or(HmmError::Uninitialized)?;
        let mut report = TrainingReport {
            sequences_used: usable.len(),
            sequences_skipped: skipped,
            ..Default::default()
        };

        for iteration in 1..=n_iter {
            let current: &HmmParams = params;
            let per_sequence: Vec<Option<SufficientStats>> = usable
                .par_iter()
                .map(|seq| SufficientStats::from_sequence(current, &config, *seq))
                .collect();

            // Sequential fold keeps the sum order fixed
            let rejected = per_sequence.iter().filter(|s| s.is_none()).count();
            let stats = per_sequence
                .iter()
                .flatten()
                .fold(SufficientStats::zeros(current.n_states(), expected_dim), |acc, s| {
                    acc.merge(s)
                });

            if rejected > 0 {
                warn!(
                    "Iteration {}: {} sequences had non-finite likelihood and were left out",
                    iteration, rejected
                );
            }
            report.sequences_used = stats.sequences;
            report.sequences_skipped = skipped + rejected;

            if stats.sequences == 0 {
                warn!("Iteration {}: no sequence contributed; parameters kept", iteration);
                report.log_likelihoods.push(f64::NEG_INFINITY);
                continue;
            }

            let degenerate = stats.maximize(params, &config, iteration);
            for state in &degenerate {
                debug!("Iteration {}: state {} {:?}", iteration, state.state, state.kind);
            }
            report.degenerate.extend(degenerate);

            debug!(
                "Iteration {}: log-likelihood {:.4} over {} frames",
                iteration, stats.log_likelihood, stats.frames
            );
            report.log_likelihoods.push(stats.log_likelihood);
            report.iterations += 1;
            self.iterations_trained += 1;
        }

        if report.degenerate.iter().any(|d| d.iteration.is_some()) {
            warn!(
                "{} degenerate state updates during training (floors applied)",
                report.degenerate.len()
            );
        }

        Ok(report)
    }

    /// Train on a batch of sequences
    ///
    /// A model without parameters, or `options.resume == false`, is seeded
    /// from the batch first; otherwise training continues from the current
    /// parameters.
    pub fn train(
        &mut self,
        sequences: &[Array2<f64>],
        options: TrainingOptions,
    ) -> Result<TrainingReport> {
        let seed_report = if self.params.is_none() || !options.resume {
            Some(self.initialize(sequences)?)
        } else {
            None
        };

        let mut report = self.reestimate(sequences, options.n_iter)?;
        if let Some(seed) = seed_report {
            let mut degenerate = seed.degenerate;
            degenerate.append(&mut report.degenerate);
            report.degenerate = degenerate;
            report.seeded = true;
        }

        info!(
            "Trained {}-state HMM: {} iterations, {} sequences, final log-likelihood {:?}",
            self.config.n_states,
            report.iterations,
            report.sequences_used,
            report.final_log_likelihood()
        );
        Ok(report)
    }

    /// Log-likelihood of `observations` via the forward recursion
    ///
    /// Fails with `Uninitialized`, `EmptySequence` or `DimensionMismatch`;
    /// never mutates the model.
    pub fn score(&self, observations: ArrayView2<f64>) -> Result<f64> {
        let (params, log_b) = self.emissions(observations)?;
        let log_alpha = forward(params.log_pi().view(), params.log_transition().view(), log_b.view());
        Ok(sequence_log_likelihood(log_alpha.view()))
    }

    /// [`score`](Self::score) with every failure mapped to `-inf`
    pub fn score_or_sentinel(&self, observations: ArrayView2<f64>) -> f64 {
        self.score(observations).unwrap_or(f64::NEG_INFINITY)
    }

    /// Cumulative log-likelihood after each frame
    pub fn log_likelihood_trace(&self, observations: ArrayView2<f64>) -> Result<Array1<f64>> {
        let (params, log_b) = self.emissions(observations)?;
        let log_alpha = forward(params.log_pi().view(), params.log_transition().view(), log_b.view());
        Ok(prefix_log_likelihoods(log_alpha.view()))
    }

    /// Most likely state sequence (Viterbi) and its log-probability
    pub fn decode(&self, observations: ArrayView2<f64>) -> Result<(Vec<usize>, f64)> {
        let (params, log_b) = self.emissions(observations)?;
        Ok(viterbi(
            params.log_pi().view(),
            params.log_transition().view(),
            log_b.view(),
        ))
    }

    fn emissions(&self, observations: ArrayView2<f64>) -> Result<(&HmmParams, Array2<f64>)> {
        let params = self.params.as_ref().ok_or(HmmError::Uninitialized)?;
        if observations.nrows() == 0 {
            return Err(HmmError::EmptySequence);
        }
        if observations.ncols() != params.dim() {
            return Err(HmmError::DimensionMismatch {
                expected: params.dim(),
                found: observations.ncols(),
            });
        }

        let log_b = emission_log_likelihoods(
            observations,
            params.means.view(),
            params.variances.view(),
            self.config.emission_variance_floor,
        );
        Ok((params, log_b))
    }

    /// Non-empty sequences of one shared dimensionality, plus the skip count
    fn usable_sequences<'a>(
        &self,
        sequences: &'a [Array2<f64>],
        expected_dim: Option<usize>,
    ) -> Result<(Vec<ArrayView2<'a, f64>>, usize)> {
        let mut dim = expected_dim;
        let mut usable = Vec::with_capacity(sequences.len());
        let mut skipped = 0;

        for seq in sequences {
            if seq.nrows() == 0 {
                skipped += 1;
                continue;
            }
            match dim {
                Some(d) if d != seq.ncols() => {
                    return Err(HmmError::DimensionMismatch {
                        expected: d,
                        found: seq.ncols(),
                    })
                }
                Some(_) => {}
                None => dim = Some(seq.ncols()),
            }
            usable.push(seq.view());
        }

        if skipped > 0 {
            warn!("Skipped {} empty training sequences", skipped);
        }
        if usable.is_empty() {
            return Err(HmmError::NoTrainingData);
        }
        Ok((usable, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn two_cluster_sequences() -> Vec<Array2<f64>> {
        (0..4)
            .map(|k| {
                let offset = k as f64 * 0.1;
                array![
                    [0.0 + offset, 1.0],
                    [0.2 + offset, 1.1],
                    [0.1, 0.9 - offset],
                    [5.0, -1.0 + offset],
                    [5.2 - offset, -1.1],
                    [4.9, -0.9]
                ]
            })
            .collect()
    }

    #[test]
    fn test_stage_transitions() {
        let mut model = GaussianHmm::new(HmmConfig::with_states(2)).unwrap();
        assert_eq!(model.stage(), ModelStage::Uninitialized);

        let data = two_cluster_sequences();
        model.initialize(&data).unwrap();
        assert_eq!(model.stage(), ModelStage::Initialized);

        model.reestimate(&data, 1).unwrap();
        assert_eq!(model.stage(), ModelStage::Trained);
        assert_eq!(model.iterations_trained(), 1);
    }

    #[test]
    fn test_score_uninitialized_fails() {
        let model = GaussianHmm::new(HmmConfig::default()).unwrap();
        let obs = array![[0.0, 0.0]];
        assert!(matches!(model.score(obs.view()), Err(HmmError::Uninitialized)));
        assert_eq!(model.score_or_sentinel(obs.view()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_reestimate_requires_seed() {
        let mut model = GaussianHmm::new(HmmConfig::with_states(2)).unwrap();
        let result = model.reestimate(&two_cluster_sequences(), 2);
        assert!(matches!(result, Err(HmmError::Uninitialized)));
    }

    #[test]
    fn test_training_does_not_decrease_likelihood() {
        let data = two_cluster_sequences();
        let mut model = GaussianHmm::new(HmmConfig::with_states(2)).unwrap();
        let report = model.train(&data, TrainingOptions::iterations(6)).unwrap();

        assert!(report.seeded);
        assert_eq!(report.iterations, 6);
        for pair in report.log_likelihoods.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-6, "{:?}", report.log_likelihoods);
        }
    }

    #[test]
    fn test_empty_sequences_are_skipped() {
        let mut data = two_cluster_sequences();
        data.push(Array2::zeros((0, 2)));
        let mut model = GaussianHmm::new(HmmConfig::with_states(2)).unwrap();
        let report = model.train(&data, TrainingOptions::iterations(1)).unwrap();
        assert_eq!(report.sequences_used, 4);
        assert_eq!(report.sequences_skipped, 1);
    }

    #[test]
    fn test_no_training_data() {
        let mut model = GaussianHmm::new(HmmConfig::with_states(2)).unwrap();
        assert!(matches!(
            model.train(&[], TrainingOptions::default()),
            Err(HmmError::NoTrainingData)
        ));
        assert!(matches!(
            model.train(&[Array2::zeros((0, 3))], TrainingOptions::default()),
            Err(HmmError::NoTrainingData)
        ));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let data = vec![Array2::zeros((3, 2)), Array2::zeros((3, 4))];
        let mut model = GaussianHmm::new(HmmConfig::with_states(2)).unwrap();
        assert!(matches!(
            model.train(&data, TrainingOptions::default()),
            Err(HmmError::DimensionMismatch { expected: 2, found: 4 })
        ));
    }

    #[test]
    fn test_decode_separates_clusters() {
        // One sequence so the two seeding chunks fall on the two clusters
        let data = vec![two_cluster_sequences().remove(0)];
        let model = GaussianHmm::fit(&data, HmmConfig::with_states(2).iterations(5)).unwrap();
        let (path, log_prob) = model.decode(data[0].view()).unwrap();

        assert_eq!(path.len(), 6);
        assert!(log_prob.is_finite());
        assert_eq!(path[0], path[1]);
        assert_eq!(path[3], path[4]);
        assert_ne!(path[0], path[3]);
    }

    #[test]
    fn test_trace_ends_at_score() {
        let data = two_cluster_sequences();
        let model = GaussianHmm::fit(&data, HmmConfig::with_states(2).iterations(2)).unwrap();
        let trace = model.log_likelihood_trace(data[1].view()).unwrap();
        let score = model.score(data[1].view()).unwrap();
        assert_eq!(trace.len(), 6);
        assert_abs_diff_eq!(trace[5], score, epsilon = 1e-12);
    }

    #[test]
    fn test_from_params_takes_state_count() {
        let params = HmmParams {
            pi: array![0.5, 0.5],
            transition: array![[0.5, 0.5], [0.5, 0.5]],
            means: array![[0.0], [1.0]],
            variances: array![[1.0], [1.0]],
        };
        let model = GaussianHmm::from_params(HmmConfig::default(), params, 0).unwrap();
        assert_eq!(model.n_states(), 2);
        assert_eq!(model.dim(), Some(1));
        assert_eq!(model.stage(), ModelStage::Initialized);
    }
}
