//! Diagonal-covariance Gaussian emission densities

use ndarray::{Array2, ArrayView2, Axis};
use std::f64::consts::PI;

/// Log-density of every observation under every state: shape (T, n_states)
///
/// logN(x) = -0.5 * (D ln 2π + Σ_d ln var_d + Σ_d (x_d - mean_d)² / var_d)
///
/// Variances are clamped to `variance_floor` before use.
pub fn emission_log_likelihoods(
    observations: ArrayView2<f64>,
    means: ArrayView2<f64>,
    variances: ArrayView2<f64>,
    variance_floor: f64,
) -> Array2<f64> {
    let (t_len, dim) = observations.dim();
    let n_states = means.nrows();
    let log_two_pi = dim as f64 * (2.0 * PI).ln();

    let mut log_b = Array2::zeros((t_len, n_states));
    for (state, mut column) in log_b.axis_iter_mut(Axis(1)).enumerate() {
        let var = variances.row(state).mapv(|v| v.max(variance_floor));
        let log_det = var.mapv(f64::ln).sum();
        let inv_var = var.mapv(f64::recip);

        let diff = &observations - &means.row(state);
        let mahalanobis = (&diff * &diff).dot(&inv_var);

        column.assign(&mahalanobis.mapv(|m| -0.5 * (log_two_pi + log_det + m)));
    }

    log_b
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_standard_normal_at_mean() {
        let obs = array![[0.0, 0.0]];
        let means = array![[0.0, 0.0]];
        let vars = array![[1.0, 1.0]];
        let log_b = emission_log_likelihoods(obs.view(), means.view(), vars.view(), 1e-5);
        assert_abs_diff_eq!(log_b[[0, 0]], -(2.0 * PI).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_matches_scalar_formula() {
        let obs = array![[1.0, -2.0, 0.5], [0.0, 0.3, 3.0]];
        let means = array![[0.5, -1.0, 0.0], [2.0, 2.0, 2.0]];
        let vars = array![[0.5, 2.0, 1.5], [1.0, 0.25, 4.0]];
        let log_b = emission_log_likelihoods(obs.view(), means.view(), vars.view(), 1e-5);

        for t in 0..2 {
            for s in 0..2 {
                let mut expected = 3.0 * (2.0 * PI).ln();
                for d in 0..3 {
                    expected += vars[[s, d]].ln();
                    expected += (obs[[t, d]] - means[[s, d]]).powi(2) / vars[[s, d]];
                }
                assert_abs_diff_eq!(log_b[[t, s]], -0.5 * expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_zero_variance_is_floored() {
        let obs = array![[1.0]];
        let means = array![[1.0]];
        let vars = array![[0.0]];
        let log_b = emission_log_likelihoods(obs.view(), means.view(), vars.view(), 1e-5);
        assert!(log_b[[0, 0]].is_finite());
        assert_abs_diff_eq!(
            log_b[[0, 0]],
            -0.5 * ((2.0 * PI).ln() + 1e-5_f64.ln()),
            epsilon = 1e-10
        );
    }
}
