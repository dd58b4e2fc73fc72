//! Baum-Welch sufficient statistics (E-step) and re-estimation (M-step)

use crate::config::HmmConfig;
use crate::gaussian::emission_log_likelihoods;
use crate::inference::{backward, forward, sequence_log_likelihood};
use crate::params::HmmParams;
use crate::report::{DegenerateKind, DegenerateState};
use ndarray::{s, Array1, Array2, ArrayView2, Axis, Zip};
use tracing::warn;

/// Accumulators for one iteration, summed over sequences
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    /// Σ_t xi[t, i, j]
    pub transition_numerator: Array2<f64>,
    /// Σ_{t < T-1} gamma[t, i]
    pub transition_denominator: Array1<f64>,
    /// Σ_t gamma[t, s]
    pub occupancy: Array1<f64>,
    /// Σ_t gamma[t, s] x_t
    pub weighted_sum: Array2<f64>,
    /// Σ_t gamma[t, s] x_t²
    pub weighted_square_sum: Array2<f64>,
    /// Σ log P(sequence)
    pub log_likelihood: f64,
    pub sequences: usize,
    pub frames: usize,
}

impl SufficientStats {
    pub fn zeros(n_states: usize, dim: usize) -> Self {
        Self {
            transition_numerator: Array2::zeros((n_states, n_states)),
            transition_denominator: Array1::zeros(n_states),
            occupancy: Array1::zeros(n_states),
            weighted_sum: Array2::zeros((n_states, dim)),
            weighted_square_sum: Array2::zeros((n_states, dim)),
            log_likelihood: 0.0,
            sequences: 0,
            frames: 0,
        }
    }

    /// E-step for a single sequence
    ///
    /// Returns `None` when the sequence's likelihood under `params` is not
    /// finite, in which case it must not contribute to the iteration.
    pub fn from_sequence(
        params: &HmmParams,
        config: &HmmConfig,
        observations: ArrayView2<f64>,
    ) -> Option<Self> {
        let t_len = observations.nrows();
        if t_len == 0 {
            return None;
        }

        let log_pi = params.log_pi();
        let log_a = params.log_transition();
        let log_b = emission_log_likelihoods(
            observations,
            params.means.view(),
            params.variances.view(),
            config.emission_variance_floor,
        );

        let log_alpha = forward(log_pi.view(), log_a.view(), log_b.view());
        let log_beta = backward(log_a.view(), log_b.view());
        let log_p = sequence_log_likelihood(log_alpha.view());
        if !log_p.is_finite() {
            return None;
        }

        let gamma = (&log_alpha + &log_beta - log_p).mapv(f64::exp);
        let occupancy = gamma.sum_axis(Axis(0));
        let transition_denominator = gamma.slice(s![..t_len - 1, ..]).sum_axis(Axis(0));

        let transition_numerator =
            transition_occupancy(&log_a, &log_alpha, &log_b, &log_beta, log_p);

        let weighted_sum = gamma.t().dot(&observations);
        let weighted_square_sum = gamma.t().dot(&observations.mapv(|x| x * x));

        Some(Self {
            transition_numerator,
            transition_denominator,
            occupancy,
            weighted_sum,
            weighted_square_sum,
            log_likelihood: log_p,
            sequences: 1,
            frames: t_len,
        })
    }

    /// Add another sequence's statistics into this one
    pub fn merge(mut self, other: &Self) -> Self {
        self.transition_numerator += &other.transition_numerator;
        self.transition_denominator += &other.transition_denominator;
        self.occupancy += &other.occupancy;
        self.weighted_sum += &other.weighted_sum;
        self.weighted_square_sum += &other.weighted_square_sum;
        self.log_likelihood += other.log_likelihood;
        self.sequences += other.sequences;
        self.frames += other.frames;
        self
    }

    /// M-step: update `params` in place
    ///
    /// `pi` is left untouched. Returns the states that needed a floor or
    /// reset in this iteration.
    pub fn maximize(
        &self,
        params: &mut HmmParams,
        config: &HmmConfig,
        iteration: usize,
    ) -> Vec<DegenerateState> {
        let n_states = params.n_states();
        let eps = config.denominator_epsilon;
        let uniform = 1.0 / n_states as f64;
        let mut degenerate = Vec::new();

        for (state, mut row) in params.transition.axis_iter_mut(Axis(0)).enumerate() {
            let denominator = self.transition_denominator[state] + eps;
            let estimate = self.transition_numerator.row(state).mapv(|n| n / denominator);
            let total = estimate.sum();

            if total > 0.0 && total.is_finite() {
                row.assign(&(estimate / total));
            } else {
                row.fill(uniform);
                warn!("Transition row {} had no mass; reset to uniform", state);
                degenerate.push(
                    DegenerateState::new(state, DegenerateKind::TransitionRowReset)
                        .at_iteration(iteration),
                );
            }
        }

        for state in 0..n_states {
            let occupancy = self.occupancy[state];
            if occupancy <= eps {
                warn!("State {} unoccupied in iteration {}", state, iteration);
                degenerate.push(
                    DegenerateState::new(state, DegenerateKind::Unoccupied).at_iteration(iteration),
                );
            }

            let denominator = occupancy + eps;
            let mean = self.weighted_sum.row(state).mapv(|v| v / denominator);
            let second_moment = self.weighted_square_sum.row(state).mapv(|v| v / denominator);

            let mut floored = 0;
            let mut variance = Array1::zeros(mean.len());
            Zip::from(&mut variance)
                .and(&second_moment)
                .and(&mean)
                .for_each(|var, &m2, &m| {
                    let raw = m2 - m * m;
                    // NaN compares false and is floored too
                    if raw >= config.variance_floor {
                        *var = raw;
                    } else {
                        *var = config.variance_floor;
                        floored += 1;
                    }
                });

            if floored > 0 {
                degenerate.push(
                    DegenerateState::new(state, DegenerateKind::VarianceFloored { dims: floored })
                        .at_iteration(iteration),
                );
            }

            params.means.row_mut(state).assign(&mean);
            params.variances.row_mut(state).assign(&variance);
        }

        degenerate
    }
}

/// Σ_t xi[t, i, j]
///
/// Each xi[t] is built whole in the log domain, so a zero transition stays
/// `-inf` and contributes nothing. xi[t] sums to one, which keeps every
/// exponentiated entry in [0, 1].
fn transition_occupancy(
    log_a: &Array2<f64>,
    log_alpha: &Array2<f64>,
    log_b: &Array2<f64>,
    log_beta: &Array2<f64>,
    log_p: f64,
) -> Array2<f64> {
    let t_len = log_alpha.nrows();
    let n_states = log_a.nrows();
    let mut total = Array2::zeros((n_states, n_states));

    for t in 0..t_len.saturating_sub(1) {
        let from = log_alpha.row(t).insert_axis(Axis(1));
        let to = (&log_b.row(t + 1) + &log_beta.row(t + 1)).insert_axis(Axis(0));

        let mut log_xi = log_a - log_p;
        log_xi += &from;
        log_xi += &to;
        total += &log_xi.mapv(f64::exp);
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn two_state_params() -> HmmParams {
        HmmParams {
            pi: array![0.5, 0.5],
            transition: array![[0.8, 0.2], [0.3, 0.7]],
            means: array![[0.0], [3.0]],
            variances: array![[1.0], [1.0]],
        }
    }

    #[test]
    fn test_gamma_rows_sum_to_one() {
        let params = two_state_params();
        let config = HmmConfig::with_states(2);
        let obs = array![[0.1], [0.4], [2.9], [3.2]];
        let stats = SufficientStats::from_sequence(&params, &config, obs.view()).unwrap();

        // Σ_s Σ_t gamma = T
        assert_abs_diff_eq!(stats.occupancy.sum(), 4.0, epsilon = 1e-10);
        assert_abs_diff_eq!(stats.transition_denominator.sum(), 3.0, epsilon = 1e-10);
        assert_eq!(stats.frames, 4);
    }

    #[test]
    fn test_xi_contraction_matches_direct_sum() {
        let params = two_state_params();
        let config = HmmConfig::with_states(2);
        let obs = array![[0.1], [0.4], [2.9], [3.2], [-0.5]];
        let stats = SufficientStats::from_sequence(&params, &config, obs.view()).unwrap();

        let log_a = params.log_transition();
        let log_b = emission_log_likelihoods(
            obs.view(),
            params.means.view(),
            params.variances.view(),
            config.emission_variance_floor,
        );
        let log_alpha = forward(params.log_pi().view(), log_a.view(), log_b.view());
        let log_beta = backward(log_a.view(), log_b.view());
        let log_p = sequence_log_likelihood(log_alpha.view());

        let mut direct: Array2<f64> = Array2::zeros((2, 2));
        for t in 0..4 {
            for i in 0..2 {
                for j in 0..2 {
                    direct[[i, j]] += (log_alpha[[t, i]]
                        + log_a[[i, j]]
                        + log_b[[t + 1, j]]
                        + log_beta[[t + 1, j]]
                        - log_p)
                        .exp();
                }
            }
        }

        for (got, want) in stats.transition_numerator.iter().zip(direct.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-10);
        }
        // Σ_j xi[t, i, j] = gamma[t, i]
        for i in 0..2 {
            assert_abs_diff_eq!(
                stats.transition_numerator.row(i).sum(),
                stats.transition_denominator[i],
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_merge_adds_counts() {
        let params = two_state_params();
        let config = HmmConfig::with_states(2);
        let a = array![[0.0], [3.0]];
        let b = array![[1.0], [2.0], [3.0]];
        let sa = SufficientStats::from_sequence(&params, &config, a.view()).unwrap();
        let sb = SufficientStats::from_sequence(&params, &config, b.view()).unwrap();

        let merged = SufficientStats::zeros(2, 1).merge(&sa).merge(&sb);
        assert_eq!(merged.sequences, 2);
        assert_eq!(merged.frames, 5);
        assert_abs_diff_eq!(
            merged.log_likelihood,
            sa.log_likelihood + sb.log_likelihood,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_maximize_keeps_pi_and_normalises_rows() {
        let mut params = two_state_params();
        let config = HmmConfig::with_states(2);
        let obs = array![[0.1], [0.4], [2.9], [3.2]];
        let stats = SufficientStats::from_sequence(&params, &config, obs.view()).unwrap();

        stats.maximize(&mut params, &config, 1);
        assert_eq!(params.pi, array![0.5, 0.5]);
        for row in params.transition.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert!(params.variances.iter().all(|&v| v >= config.variance_floor));
        params.validate().unwrap();
    }

    #[test]
    fn test_maximize_reports_empty_rows() {
        let mut params = two_state_params();
        let config = HmmConfig::with_states(2);
        let stats = SufficientStats::zeros(2, 1);

        let degenerate = stats.maximize(&mut params, &config, 3);
        assert!(degenerate
            .iter()
            .any(|d| d.kind == DegenerateKind::TransitionRowReset && d.iteration == Some(3)));
        assert!(degenerate.iter().any(|d| d.kind == DegenerateKind::Unoccupied));
        assert_eq!(params.transition, array![[0.5, 0.5], [0.5, 0.5]]);
        assert_eq!(params.variances, array![[1e-4], [1e-4]]);
    }

    #[test]
    fn test_single_frame_sequence() {
        let params = two_state_params();
        let config = HmmConfig::with_states(2);
        let obs = array![[0.0]];
        let stats = SufficientStats::from_sequence(&params, &config, obs.view()).unwrap();
        assert_eq!(stats.transition_numerator, Array2::<f64>::zeros((2, 2)));
        assert_abs_diff_eq!(stats.occupancy.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_transitions_keep_sequence() {
        // A = I: each sequence is pinned to its starting state
        let params = HmmParams {
            pi: array![0.5, 0.5],
            transition: array![[1.0, 0.0], [0.0, 1.0]],
            means: array![[0.0], [10.0]],
            variances: array![[0.01], [0.01]],
        };
        let config = HmmConfig::with_states(2);
        let obs = array![[0.0], [10.0], [10.0]];

        let stats = SufficientStats::from_sequence(&params, &config, obs.view()).unwrap();
        assert!(stats.log_likelihood.is_finite());
        assert!(stats.log_likelihood < -4000.0);

        assert_eq!(stats.transition_numerator[[0, 1]], 0.0);
        assert_eq!(stats.transition_numerator[[1, 0]], 0.0);
        assert_abs_diff_eq!(stats.transition_numerator[[1, 1]], 2.0, epsilon = 1e-9);
        for i in 0..2 {
            assert_abs_diff_eq!(
                stats.transition_numerator.row(i).sum(),
                stats.transition_denominator[i],
                epsilon = 1e-9
            );
        }
    }
}
