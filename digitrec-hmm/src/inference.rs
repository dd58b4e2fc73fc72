//! Forward, backward and Viterbi recursions in the log domain
//!
//! All routines take the emission matrix `log_b` (T, S) precomputed by
//! [`crate::gaussian::emission_log_likelihoods`] so training can share it
//! between passes.

use crate::logmath::{log_sum_exp, log_sum_exp_axis};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Forward pass: `log_alpha[t, j]`
///
/// log_alpha[0] = log_pi + log_b[0]
/// log_alpha[t, j] = lse_i(log_alpha[t-1, i] + log_a[i, j]) + log_b[t, j]
pub fn forward(
    log_pi: ArrayView1<f64>,
    log_a: ArrayView2<f64>,
    log_b: ArrayView2<f64>,
) -> Array2<f64> {
    let (t_len, n_states) = log_b.dim();
    let mut log_alpha = Array2::from_elem((t_len, n_states), f64::NEG_INFINITY);
    if t_len == 0 {
        return log_alpha;
    }

    log_alpha.row_mut(0).assign(&(&log_pi + &log_b.row(0)));
    for t in 1..t_len {
        // paths[i, j] = log_alpha[t-1, i] + log_a[i, j]
        let prev = log_alpha.row(t - 1).insert_axis(Axis(1));
        let paths = &log_a + &prev;
        let next = log_sum_exp_axis(paths.view(), Axis(0)) + &log_b.row(t);
        log_alpha.row_mut(t).assign(&next);
    }

    log_alpha
}

/// Backward pass: `log_beta[t, i]`
///
/// log_beta[T-1] = 0
/// log_beta[t, i] = lse_j(log_a[i, j] + log_b[t+1, j] + log_beta[t+1, j])
pub fn backward(log_a: ArrayView2<f64>, log_b: ArrayView2<f64>) -> Array2<f64> {
    let (t_len, n_states) = log_b.dim();
    let mut log_beta = Array2::zeros((t_len, n_states));
    if t_len == 0 {
        return log_beta;
    }

    for t in (0..t_len - 1).rev() {
        let ahead = &log_b.row(t + 1) + &log_beta.row(t + 1);
        let paths = &log_a + &ahead.insert_axis(Axis(0));
        let current = log_sum_exp_axis(paths.view(), Axis(1));
        log_beta.row_mut(t).assign(&current);
    }

    log_beta
}

/// `lse(log_alpha[T-1, :])`, `-inf` for an empty sequence
pub fn sequence_log_likelihood(log_alpha: ArrayView2<f64>) -> f64 {
    match log_alpha.nrows() {
        0 => f64::NEG_INFINITY,
        t_len => log_sum_exp(log_alpha.row(t_len - 1)),
    }
}

/// Per-frame cumulative log-likelihood `lse(log_alpha[t, :])`
pub fn prefix_log_likelihoods(log_alpha: ArrayView2<f64>) -> Array1<f64> {
    log_sum_exp_axis(log_alpha, Axis(1))
}

/// Most likely state path and its joint log-probability
pub fn viterbi(
    log_pi: ArrayView1<f64>,
    log_a: ArrayView2<f64>,
    log_b: ArrayView2<f64>,
) -> (Vec<usize>, f64) {
    let (t_len, n_states) = log_b.dim();
    if t_len == 0 || n_states == 0 {
        return (Vec::new(), f64::NEG_INFINITY);
    }

    let mut delta = Array2::from_elem((t_len, n_states), f64::NEG_INFINITY);
    let mut backpointer = Array2::<usize>::zeros((t_len, n_states));
    delta.row_mut(0).assign(&(&log_pi + &log_b.row(0)));

    for t in 1..t_len {
        for j in 0..n_states {
            let (best_i, best) = argmax(
                delta
                    .row(t - 1)
                    .iter()
                    .zip(log_a.column(j))
                    .map(|(&d, &a)| d + a),
            );
            delta[[t, j]] = best + log_b[[t, j]];
            backpointer[[t, j]] = best_i;
        }
    }

    let (mut state, best) = argmax(delta.row(t_len - 1).iter().copied());
    let mut path = vec![0; t_len];
    path[t_len - 1] = state;
    for t in (1..t_len).rev() {
        state = backpointer[[t, state]];
        path[t - 1] = state;
    }

    (path, best)
}

/// First index of the maximum; `-inf` everywhere picks index 0
fn argmax(values: impl Iterator<Item = f64>) -> (usize, f64) {
    values
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
}
