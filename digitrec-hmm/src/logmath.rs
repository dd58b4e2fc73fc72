//! Log-domain helpers

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Numerically stable `ln(Σ exp(x_i))`
///
/// Empty input or all `-inf` gives `-inf` rather than NaN.
pub fn log_sum_exp(values: ArrayView1<f64>) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    max + values.iter().map(|&v| (v - max).exp()).sum::<f64>().ln()
}

/// [`log_sum_exp`] of every lane along `axis`
pub fn log_sum_exp_axis(values: ArrayView2<f64>, axis: Axis) -> Array1<f64> {
    values.map_axis(axis, log_sum_exp)
}

/// Natural log with exact zeros mapped to `-inf` explicitly
pub fn ln_or_neg_inf(x: f64) -> f64 {
    if x > 0.0 {
        x.ln()
    } else {
        f64::NEG_INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    #[test]
    fn test_log_sum_exp_matches_naive() {
        let v = array![0.1, -2.0, 3.5];
        let naive = v.iter().map(|x: &f64| x.exp()).sum::<f64>().ln();
        assert_abs_diff_eq!(log_sum_exp(v.view()), naive, epsilon = 1e-12);
    }

    #[test]
    fn test_log_sum_exp_large_values() {
        let v = array![1000.0, 1000.0];
        assert_abs_diff_eq!(log_sum_exp(v.view()), 1000.0 + 2.0_f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_log_sum_exp_all_neg_inf() {
        let v = array![f64::NEG_INFINITY, f64::NEG_INFINITY];
        assert_eq!(log_sum_exp(v.view()), f64::NEG_INFINITY);
        let empty: Array1<f64> = Array1::zeros(0);
        assert_eq!(log_sum_exp(empty.view()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_log_sum_exp_axis() {
        let m = array![[0.0, 0.0], [1.0, f64::NEG_INFINITY]];
        let cols = log_sum_exp_axis(m.view(), Axis(0));
        assert_abs_diff_eq!(cols[0], (1.0 + 1.0_f64.exp()).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(cols[1], 0.0, epsilon = 1e-12);

        let rows = log_sum_exp_axis(m.view(), Axis(1));
        assert_abs_diff_eq!(rows[0], 2.0_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(rows[1], 1.0, epsilon = 1e-12);
    }
}
