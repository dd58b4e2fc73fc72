//! Linear prediction analysis and formant estimation
//!
//! Each frame is Hann-windowed, its autocorrelation up to `order` lags is
//! solved with the Levinson-Durbin recursion, and the resulting predictor
//! polynomial A(z) = 1 + a1 z^-1 + ... + ap z^-p gives formants (root
//! angles) and a smoothed spectral envelope G / |A(e^jω)|.

use crate::audio::Waveform;
use crate::error::{FeatureError, Result};
use crate::preprocess::{frame_signal, hann_window, FrameConfig};
use ndarray::{Array1, ArrayView1, Axis};
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;
use tracing::debug;

/// Default predictor order
pub const DEFAULT_LPC_ORDER: usize = 12;

/// Root angles below this frequency are not reported as formants
pub const MIN_FORMANT_HZ: f64 = 90.0;

const ROOT_MAX_ITERATIONS: usize = 500;
const ROOT_TOLERANCE: f64 = 1e-12;

/// Predictor polynomial of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LpcCoefficients {
    /// `[1, a1, ..., ap]`; all zeros for a silent frame
    pub a: Array1<f64>,
    /// Square root of the final prediction error
    pub gain: f64,
}

impl LpcCoefficients {
    pub fn order(&self) -> usize {
        self.a.len().saturating_sub(1)
    }

    pub fn is_silent(&self) -> bool {
        self.gain == 0.0 && self.a.iter().all(|&c| c == 0.0)
    }
}

/// LPC analyser for one sample rate and predictor order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LpcAnalyzer {
    sample_rate: u32,
    order: usize,
}

impl LpcAnalyzer {
    pub fn new(sample_rate: u32, order: usize) -> Result<Self> {
        if sample_rate == 0 {
            return Err(FeatureError::config("sample_rate must be positive"));
        }
        if order == 0 {
            return Err(FeatureError::config("LPC order must be positive"));
        }
        Ok(Self { sample_rate, order })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Predictor coefficients of a single frame
    pub fn analyze(&self, frame: ArrayView1<f64>) -> LpcCoefficients {
        let windowed = &frame * &hann_window(frame.len());
        let r = autocorrelation(windowed.as_slice().unwrap_or(&[]), self.order);

        if r[0] == 0.0 {
            return LpcCoefficients {
                a: Array1::zeros(self.order + 1),
                gain: 0.0,
            };
        }

        let (a, error) = levinson_durbin(&r, self.order);
        LpcCoefficients {
            a,
            gain: error.abs().sqrt(),
        }
    }

    /// Frame a waveform and analyse every frame
    pub fn analyze_waveform(
        &self,
        waveform: &Waveform,
        frame: FrameConfig,
    ) -> Result<Vec<LpcCoefficients>> {
        if waveform.sample_rate() != self.sample_rate {
            return Err(FeatureError::InvalidConfiguration(format!(
                "LPC analyser built for {} Hz, waveform is {} Hz",
                self.sample_rate,
                waveform.sample_rate()
            )));
        }
        let geometry = frame.frame_geometry(self.sample_rate)?;
        let signal: Vec<f64> = waveform.samples().iter().map(|&s| f64::from(s)).collect();
        let frames = frame_signal(&signal, geometry);

        let coefficients: Vec<LpcCoefficients> = frames
            .axis_iter(Axis(0))
            .map(|row| self.analyze(row))
            .collect();
        debug!(
            "LPC order {} over {} frames at {} Hz",
            self.order,
            coefficients.len(),
            self.sample_rate
        );
        Ok(coefficients)
    }

    /// Formant frequencies in Hz, ascending
    ///
    /// Taken from the roots of A(z) in the upper half plane; angles below
    /// [`MIN_FORMANT_HZ`] are dropped.
    pub fn formants(&self, lpc: &LpcCoefficients) -> Vec<f64> {
        let coefficients = lpc.a.to_vec();
        let hz_per_radian = self.sample_rate as f64 / (2.0 * PI);

        let mut formants: Vec<f64> = polynomial_roots(&coefficients)
            .into_iter()
            .filter(|root| root.im > 0.0)
            .map(|root| root.arg() * hz_per_radian)
            .filter(|&hz| hz > MIN_FORMANT_HZ)
            .collect();
        formants.sort_by(f64::total_cmp);
        formants
    }

    /// `(frequencies_hz, magnitude_db)` of G / A(e^jω) at `n_points` bins in [0, fs/2)
    pub fn spectral_envelope(
        &self,
        lpc: &LpcCoefficients,
        n_points: usize,
    ) -> (Array1<f64>, Array1<f64>) {
        let nyquist = self.sample_rate as f64 / 2.0;
        let frequencies =
            Array1::from_shape_fn(n_points, |k| k as f64 * nyquist / n_points as f64);

        let magnitude_db = frequencies.mapv(|hz| {
            if lpc.gain == 0.0 {
                return f64::NEG_INFINITY;
            }
            let omega = PI * hz / nyquist;
            let response = lpc
                .a
                .iter()
                .enumerate()
                .fold(Complex64::new(0.0, 0.0), |acc, (m, &c)| {
                    acc + Complex64::from_polar(c, -omega * m as f64)
                });
            20.0 * (lpc.gain / response.norm()).log10()
        });

        (frequencies, magnitude_db)
    }
}

/// R[k] = Σ_n x[n] x[n+k] for k in 0..=max_lag
pub fn autocorrelation(signal: &[f64], max_lag: usize) -> Vec<f64> {
    (0..=max_lag)
        .map(|lag| {
            signal
                .iter()
                .zip(signal.iter().skip(lag))
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Solve the normal equations for `[1, a1, ..., ap]` and the prediction error
///
/// `r` must hold at least `order + 1` lags with `r[0] > 0`. The recursion
/// stops early once the error stops being positive, leaving the remaining
/// coefficients at zero.
pub fn levinson_durbin(r: &[f64], order: usize) -> (Array1<f64>, f64) {
    let order = order.min(r.len().saturating_sub(1));
    let mut a = Array1::zeros(order + 1);
    a[0] = 1.0;

    let mut error = r.first().copied().unwrap_or(0.0);
    if error <= 0.0 {
        return (a, error.max(0.0));
    }

    let mut previous = a.clone();
    for i in 1..=order {
        let acc: f64 = r[i] + (1..i).map(|j| previous[j] * r[i - j]).sum::<f64>();
        let k = -acc / error;

        a[i] = k;
        for j in 1..i {
            a[j] = previous[j] + k * previous[i - j];
        }

        let next_error = error * (1.0 - k * k);
        if next_error <= 0.0 {
            error = next_error.max(0.0);
            break;
        }
        error = next_error;
        previous.assign(&a);
    }

    (a, error)
}

/// Complex roots of `c[0] z^n + c[1] z^(n-1) + ... + c[n]`
///
/// Leading zeros are ignored and trailing zeros become roots at the
/// origin. The rest are found with Durand-Kerner iteration.
pub fn polynomial_roots(coefficients: &[f64]) -> Vec<Complex64> {
    let Some(first) = coefficients.iter().position(|&c| c != 0.0) else {
        return Vec::new();
    };
    let coefficients = &coefficients[first..];
    let trailing = coefficients.iter().rev().take_while(|&&c| c == 0.0).count();
    let poly = &coefficients[..coefficients.len() - trailing];

    let mut roots = vec![Complex64::new(0.0, 0.0); trailing];
    let degree = poly.len() - 1;
    if degree == 0 {
        return roots;
    }

    let monic: Vec<f64> = poly.iter().map(|&c| c / poly[0]).collect();
    let evaluate = |z: Complex64| {
        monic
            .iter()
            .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * z + c)
    };

    // Cauchy bound: every root lies within this radius
    let radius = 1.0 + monic[1..].iter().fold(0.0_f64, |m, c| m.max(c.abs()));
    let mut estimates: Vec<Complex64> = (0..degree)
        .map(|k| Complex64::from_polar(radius, 2.0 * PI * k as f64 / degree as f64 + 0.4))
        .collect();

    for _ in 0..ROOT_MAX_ITERATIONS {
        let mut largest_step = 0.0_f64;
        for k in 0..degree {
            let z = estimates[k];
            let denominator = estimates
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != k)
                .fold(Complex64::new(1.0, 0.0), |acc, (_, &other)| acc * (z - other));
            if denominator.norm() == 0.0 {
                continue;
            }
            let step = evaluate(z) / denominator;
            estimates[k] = z - step;
            largest_step = largest_step.max(step.norm());
        }
        if largest_step < ROOT_TOLERANCE * radius {
            break;
        }
    }

    roots.extend(estimates);
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// A(z) with one conjugate pole pair at `hz` and radius `r`
    fn resonator(hz: f64, r: f64, sample_rate: f64) -> Vec<f64> {
        let theta = 2.0 * PI * hz / sample_rate;
        vec![1.0, -2.0 * r * theta.cos(), r * r]
    }

    fn multiply(p: &[f64], q: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; p.len() + q.len() - 1];
        for (i, a) in p.iter().enumerate() {
            for (j, b) in q.iter().enumerate() {
                out[i + j] += a * b;
            }
        }
        out
    }

    #[test]
    fn test_autocorrelation_known_values() {
        let r = autocorrelation(&[1.0, 2.0, 3.0], 3);
        assert_eq!(r, vec![14.0, 8.0, 3.0, 0.0]);
    }

    #[test]
    fn test_levinson_first_order_process() {
        // R[k] = 0.5^k is the autocorrelation of an AR(1) process with pole 0.5
        let (a, error) = levinson_durbin(&[1.0, 0.5, 0.25], 2);
        assert_abs_diff_eq!(a[0], 1.0);
        assert_abs_diff_eq!(a[1], -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(a[2], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(error, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_recovers_second_order_process() {
        // x[n] = 1.3 x[n-1] - 0.8 x[n-2] + e[n]
        let mut seed: u32 = 0x9e37_79b9;
        let mut noise = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed as f64 / u32::MAX as f64 - 0.5
        };
        let mut signal = vec![0.0_f64; 20_000];
        for n in 2..signal.len() {
            signal[n] = 1.3 * signal[n - 1] - 0.8 * signal[n - 2] + noise();
        }

        let analyzer = LpcAnalyzer::new(8000, 2).unwrap();
        let lpc = analyzer.analyze(Array1::from(signal).view());
        assert_eq!(lpc.order(), 2);
        assert_abs_diff_eq!(lpc.a[0], 1.0);
        assert_abs_diff_eq!(lpc.a[1], -1.3, epsilon = 0.05);
        assert_abs_diff_eq!(lpc.a[2], 0.8, epsilon = 0.05);
        assert!(lpc.gain > 0.0);
    }

    #[test]
    fn test_silent_frame() {
        let analyzer = LpcAnalyzer::new(16000, DEFAULT_LPC_ORDER).unwrap();
        let lpc = analyzer.analyze(Array1::zeros(400).view());
        assert!(lpc.is_silent());
        assert_eq!(lpc.a.len(), DEFAULT_LPC_ORDER + 1);
        assert!(analyzer.formants(&lpc).is_empty());
    }

    #[test]
    fn test_polynomial_roots() {
        // (z - 1)(z - 2)(z + 3)
        let mut roots: Vec<f64> = polynomial_roots(&[1.0, 0.0, -7.0, 6.0])
            .iter()
            .map(|z| {
                assert!(z.im.abs() < 1e-9);
                z.re
            })
            .collect();
        roots.sort_by(f64::total_cmp);
        assert_abs_diff_eq!(roots[0], -3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(roots[1], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(roots[2], 2.0, epsilon = 1e-9);

        let with_zero = polynomial_roots(&[0.0, 2.0, -4.0, 0.0]);
        assert_eq!(with_zero.len(), 2);
        assert!(with_zero.iter().any(|z| z.norm() < 1e-12));
        assert!(with_zero.iter().any(|z| (z.re - 2.0).abs() < 1e-9));
    }

    #[test]
    fn test_formants_from_resonators() {
        let analyzer = LpcAnalyzer::new(8000, 4).unwrap();
        let lpc = LpcCoefficients {
            a: Array1::from(multiply(
                &resonator(1800.0, 0.95, 8000.0),
                &resonator(700.0, 0.9, 8000.0),
            )),
            gain: 1.0,
        };

        let formants = analyzer.formants(&lpc);
        assert_eq!(formants.len(), 2);
        assert_abs_diff_eq!(formants[0], 700.0, epsilon = 1e-6);
        assert_abs_diff_eq!(formants[1], 1800.0, epsilon = 1e-6);
    }

    #[test]
    fn test_low_resonance_is_not_a_formant() {
        let analyzer = LpcAnalyzer::new(8000, 2).unwrap();
        let lpc = LpcCoefficients {
            a: Array1::from(resonator(60.0, 0.9, 8000.0)),
            gain: 1.0,
        };
        assert!(analyzer.formants(&lpc).is_empty());
    }

    #[test]
    fn test_spectral_envelope() {
        let analyzer = LpcAnalyzer::new(8000, 1).unwrap();
        let lpc = LpcCoefficients {
            a: array![1.0, -0.9],
            gain: 1.0,
        };
        let (frequencies, db) = analyzer.spectral_envelope(&lpc, 256);
        assert_eq!(frequencies.len(), 256);
        assert_eq!(frequencies[0], 0.0);
        assert_abs_diff_eq!(frequencies[128], 2000.0, epsilon = 1e-9);
        // 1 / |1 - 0.9| at DC
        assert_abs_diff_eq!(db[0], 20.0, epsilon = 1e-9);
        assert!(db[0] > db[255]);

        let silent = LpcCoefficients {
            a: Array1::zeros(2),
            gain: 0.0,
        };
        let (_, db) = analyzer.spectral_envelope(&silent, 8);
        assert!(db.iter().all(|v| *v == f64::NEG_INFINITY));
    }

    #[test]
    fn test_analyze_waveform_frames() {
        let samples: Vec<f32> = (0..1600)
            .map(|n| (2.0 * std::f32::consts::PI * 500.0 * n as f32 / 8000.0).sin())
            .collect();
        let waveform = Waveform::new(samples, 8000);
        let analyzer = LpcAnalyzer::new(8000, 8).unwrap();

        let frames = analyzer
            .analyze_waveform(&waveform, FrameConfig::default())
            .unwrap();
        // ceil((1600 - 200) / 80)
        assert_eq!(frames.len(), 18);
        assert!(frames.iter().all(|f| f.a.len() == 9));

        let wrong_rate = Waveform::new(vec![0.0; 100], 16000);
        assert!(analyzer
            .analyze_waveform(&wrong_rate, FrameConfig::default())
            .is_err());
    }
}
