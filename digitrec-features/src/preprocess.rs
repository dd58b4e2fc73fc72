//! Signal preprocessing: pre-emphasis, framing and windowing
//!
//! Frames are returned as one `(num_frames, frame_length)` matrix so the
//! spectral stage can work row by row without re-slicing the signal.

use crate::error::{FeatureError, Result};
use ndarray::{Array1, Array2, Axis};
use std::f64::consts::PI;

/// Standard pre-emphasis coefficient for speech
pub const DEFAULT_PRE_EMPHASIS: f64 = 0.97;

/// Framing configuration (durations in seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameConfig {
    /// Frame length in seconds (default: 25ms)
    pub frame_size: f64,
    /// Hop between frame starts in seconds (default: 10ms)
    pub frame_stride: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_size: 0.025,
            frame_stride: 0.010,
        }
    }
}

impl FrameConfig {
    pub fn frame_size(mut self, seconds: f64) -> Self {
        self.frame_size = seconds;
        self
    }

    pub fn frame_stride(mut self, seconds: f64) -> Self {
        self.frame_stride = seconds;
        self
    }

    /// Check that both durations are positive and finite
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_size > 0.0) || !self.frame_size.is_finite() {
            return Err(FeatureError::config("frame_size must be positive"));
        }
        if !(self.frame_stride > 0.0) || !self.frame_stride.is_finite() {
            return Err(FeatureError::config("frame_stride must be positive"));
        }
        Ok(())
    }

    /// Frame length and step in samples for `sample_rate`
    ///
    /// Both must come out as at least one sample.
    pub fn frame_geometry(&self, sample_rate: u32) -> Result<FrameGeometry> {
        self.validate()?;
        if sample_rate == 0 {
            return Err(FeatureError::config("sample_rate must be positive"));
        }

        let frame_length = (self.frame_size * sample_rate as f64).round() as usize;
        let frame_step = (self.frame_stride * sample_rate as f64).round() as usize;

        if frame_length == 0 || frame_step == 0 {
            return Err(FeatureError::InvalidConfiguration(format!(
                "frame_size {}s / frame_stride {}s round to zero samples at {} Hz",
                self.frame_size, self.frame_stride, sample_rate
            )));
        }

        Ok(FrameGeometry {
            frame_length,
            frame_step,
        })
    }
}

/// Frame length/step resolved to samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub frame_length: usize,
    pub frame_step: usize,
}

impl FrameGeometry {
    /// `ceil(|signal_len - frame_length| / frame_step)`, zero for an empty signal
    pub fn num_frames(&self, signal_len: usize) -> usize {
        if signal_len == 0 {
            return 0;
        }
        signal_len.abs_diff(self.frame_length).div_ceil(self.frame_step)
    }
}

/// Apply pre-emphasis filter to audio signal
///
/// Formula: y[0] = x[0], y[n] = x[n] - coef * x[n-1]
pub fn pre_emphasis(signal: &[f32], coef: f64) -> Vec<f64> {
    let mut result = Vec::with_capacity(signal.len());

    if let Some(&first) = signal.first() {
        result.push(first as f64);
    }
    for pair in signal.windows(2) {
        result.push(pair[1] as f64 - coef * pair[0] as f64);
    }

    result
}

/// Slice `signal` into overlapping frames of equal length
///
/// The tail is zero-padded so the last frame is complete. An empty signal
/// yields a `(0, frame_length)` matrix.
pub fn frame_signal(signal: &[f64], geometry: FrameGeometry) -> Array2<f64> {
    let FrameGeometry {
        frame_length,
        frame_step,
    } = geometry;
    let num_frames = geometry.num_frames(signal.len());

    let mut frames = Array2::zeros((num_frames, frame_length));
    for (i, mut row) in frames.axis_iter_mut(Axis(0)).enumerate() {
        let start = i * frame_step;
        if start >= signal.len() {
            continue;
        }
        let end = (start + frame_length).min(signal.len());
        for (dst, &src) in row.iter_mut().zip(&signal[start..end]) {
            *dst = src;
        }
    }

    frames
}

/// Hamming window: w[n] = 0.54 - 0.46 * cos(2πn / (N - 1))
pub fn hamming_window(length: usize) -> Array1<f64> {
    if length == 1 {
        return Array1::ones(1);
    }
    Array1::from_shape_fn(length, |n| {
        0.54 - 0.46 * (2.0 * PI * n as f64 / (length - 1) as f64).cos()
    })
}

/// Hann window: w[n] = 0.5 - 0.5 * cos(2πn / (N - 1))
pub fn hann_window(length: usize) -> Array1<f64> {
    if length == 1 {
        return Array1::ones(1);
    }
    Array1::from_shape_fn(length, |n| {
        0.5 - 0.5 * (2.0 * PI * n as f64 / (length - 1) as f64).cos()
    })
}

/// Multiply every frame element-wise by a Hamming window of matching length
pub fn apply_window(frames: &mut Array2<f64>) {
    let window = hamming_window(frames.ncols());
    for mut row in frames.axis_iter_mut(Axis(0)) {
        row *= &window;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pre_emphasis_known_values() {
        let out = pre_emphasis(&[1.0, 2.0, 3.0], 0.5);
        assert_eq!(out, vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_pre_emphasis_empty() {
        assert!(pre_emphasis(&[], DEFAULT_PRE_EMPHASIS).is_empty());
    }

    #[test]
    fn test_geometry_rejects_non_positive() {
        assert!(FrameConfig::default().frame_size(0.0).frame_geometry(16000).is_err());
        assert!(FrameConfig::default().frame_stride(-0.01).frame_geometry(16000).is_err());
        assert!(FrameConfig::default().frame_geometry(0).is_err());
        // Rounds to zero samples
        assert!(FrameConfig::default()
            .frame_stride(1e-5)
            .frame_geometry(16000)
            .is_err());
    }

    #[test]
    fn test_frame_count_formula() {
        let geometry = FrameConfig::default().frame_geometry(16000).unwrap();
        assert_eq!(geometry.frame_length, 400);
        assert_eq!(geometry.frame_step, 160);
        assert_eq!(geometry.num_frames(16000), 98);
        // Shorter than one frame still yields padded frames
        assert_eq!(geometry.num_frames(100), 2);
        assert_eq!(geometry.num_frames(0), 0);
    }

    #[test]
    fn test_frame_signal_pads_tail() {
        let geometry = FrameGeometry {
            frame_length: 4,
            frame_step: 2,
        };
        let signal: Vec<f64> = (1..=7).map(|x| x as f64).collect();
        let frames = frame_signal(&signal, geometry);

        // ceil(|7 - 4| / 2) = 2
        assert_eq!(frames.dim(), (2, 4));
        assert_eq!(frames.row(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frames.row(1).to_vec(), vec![3.0, 4.0, 5.0, 6.0]);

        let short = frame_signal(&[1.0], geometry);
        assert_eq!(short.dim(), (2, 4));
        assert_eq!(short.row(0).to_vec(), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(short.row(1).to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn test_frame_signal_empty() {
        let geometry = FrameConfig::default().frame_geometry(16000).unwrap();
        let frames = frame_signal(&[], geometry);
        assert_eq!(frames.dim(), (0, 400));
    }

    #[test]
    fn test_hamming_window_endpoints() {
        let window = hamming_window(400);
        assert_abs_diff_eq!(window[0], 0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(window[399], 0.08, epsilon = 1e-12);
        assert!(window.iter().all(|&w| w <= 1.0));
        assert_eq!(hamming_window(1).to_vec(), vec![1.0]);
    }

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(5);
        assert_abs_diff_eq!(window[0], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(window[2], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(window[1], window[3], epsilon = 1e-15);
        assert_eq!(hann_window(1).to_vec(), vec![1.0]);
    }

    #[test]
    fn test_window_is_deterministic() {
        let mut a = Array2::from_elem((3, 64), 0.7);
        let mut b = a.clone();
        apply_window(&mut a);
        apply_window(&mut b);
        assert_eq!(a, b);
        assert_eq!(hamming_window(64), hamming_window(64));
    }
}
