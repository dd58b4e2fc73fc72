//! Autocorrelation pitch (F0) tracking
//!
//! Frames with too little energy, or whose strongest autocorrelation peak
//! inside the F0 search range is weak relative to lag zero, are reported as
//! unvoiced (F0 = 0).

use crate::audio::Waveform;
use crate::error::{FeatureError, Result};
use crate::preprocess::{frame_signal, FrameConfig, FrameGeometry};
use ndarray::{ArrayView1, Axis};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;
use tracing::debug;

/// Pitch tracking configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchConfig {
    /// Analysis frame and hop (default: 30ms / 10ms)
    pub frame: FrameConfig,
    /// Lowest F0 searched in Hz (default: 50)
    pub min_f0: f64,
    /// Highest F0 searched in Hz (default: 500)
    pub max_f0: f64,
    /// Frames whose Σx² falls below this are unvoiced (default: 0.001)
    pub energy_threshold: f64,
    /// Peak must exceed this fraction of the lag-zero value (default: 0.3)
    pub voicing_threshold: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default().frame_size(0.030).frame_stride(0.010),
            min_f0: 50.0,
            max_f0: 500.0,
            energy_threshold: 0.001,
            voicing_threshold: 0.3,
        }
    }
}

impl PitchConfig {
    pub fn frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Set the F0 search range in Hz
    pub fn f0_range(mut self, min_f0: f64, max_f0: f64) -> Self {
        self.min_f0 = min_f0;
        self.max_f0 = max_f0;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.frame.validate()?;
        if !(self.min_f0 > 0.0 && self.min_f0 < self.max_f0 && self.max_f0.is_finite()) {
            return Err(FeatureError::InvalidConfiguration(format!(
                "F0 range must satisfy 0 < min_f0 < max_f0, got {}..{}",
                self.min_f0, self.max_f0
            )));
        }
        if !(self.energy_threshold >= 0.0 && self.energy_threshold.is_finite()) {
            return Err(FeatureError::config("energy_threshold must be non-negative"));
        }
        if !(self.voicing_threshold >= 0.0 && self.voicing_threshold.is_finite()) {
            return Err(FeatureError::config("voicing_threshold must be non-negative"));
        }
        Ok(())
    }
}

/// Per-frame F0 estimates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchTrack {
    /// Frame centres in seconds
    pub times: Vec<f64>,
    /// F0 in Hz, 0.0 for unvoiced frames
    pub f0: Vec<f64>,
}

impl PitchTrack {
    pub fn len(&self) -> usize {
        self.f0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f0.is_empty()
    }

    /// `(time, f0)` of voiced frames only
    pub fn voiced(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times
            .iter()
            .copied()
            .zip(self.f0.iter().copied())
            .filter(|&(_, f0)| f0 > 0.0)
    }

    pub fn mean_voiced_f0(&self) -> Option<f64> {
        let (count, sum) = self
            .voiced()
            .fold((0usize, 0.0), |(n, s), (_, f0)| (n + 1, s + f0));
        (count > 0).then(|| sum / count as f64)
    }
}

/// Pitch tracker bound to one sample rate
pub struct PitchTracker {
    config: PitchConfig,
    sample_rate: u32,
    geometry: FrameGeometry,
    min_lag: usize,
    max_lag: usize,
    fft_len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for PitchTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PitchTracker")
            .field("config", &self.config)
            .field("sample_rate", &self.sample_rate)
            .field("min_lag", &self.min_lag)
            .field("max_lag", &self.max_lag)
            .finish_non_exhaustive()
    }
}

impl PitchTracker {
    pub fn new(config: PitchConfig, sample_rate: u32) -> Result<Self> {
        config.validate()?;
        let geometry = config.frame.frame_geometry(sample_rate)?;

        let rate = sample_rate as f64;
        let min_lag = ((rate / config.max_f0) as usize).max(1);
        let max_lag = ((rate / config.min_f0) as usize).min(geometry.frame_length - 1);

        // Zero-padding to 2N keeps the circular correlation free of wrap-around
        let fft_len = (2 * geometry.frame_length).next_power_of_two();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        debug!(
            "Pitch tracker: {} Hz, frame {} / step {} samples, lags {}..{}",
            sample_rate, geometry.frame_length, geometry.frame_step, min_lag, max_lag
        );

        Ok(Self {
            config,
            sample_rate,
            geometry,
            min_lag,
            max_lag,
            fft_len,
            forward,
            inverse,
        })
    }

    pub fn config(&self) -> &PitchConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn track(&self, waveform: &Waveform) -> Result<PitchTrack> {
        if waveform.sample_rate() != self.sample_rate {
            return Err(FeatureError::InvalidConfiguration(format!(
                "pitch tracker built for {} Hz, waveform is {} Hz",
                self.sample_rate,
                waveform.sample_rate()
            )));
        }
        Ok(self.track_samples(waveform.samples()))
    }

    /// Track F0 over every frame that lies fully inside the signal
    pub fn track_samples(&self, samples: &[f32]) -> PitchTrack {
        let FrameGeometry {
            frame_length,
            frame_step,
        } = self.geometry;
        if samples.len() < frame_length {
            return PitchTrack::default();
        }
        let count = (samples.len() - frame_length) / frame_step;

        let signal: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
        let frames = frame_signal(&signal, self.geometry);

        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_len];
        let mut scratch = vec![
            Complex::new(0.0, 0.0);
            self.forward
                .get_inplace_scratch_len()
                .max(self.inverse.get_inplace_scratch_len())
        ];

        let half_frame = self.config.frame.frame_size / 2.0;
        let mut track = PitchTrack::default();
        for (i, frame) in frames.axis_iter(Axis(0)).take(count).enumerate() {
            track
                .times
                .push(i as f64 * self.config.frame.frame_stride + half_frame);
            track
                .f0
                .push(self.frame_f0(frame, &mut buffer, &mut scratch));
        }

        debug!(
            "Pitch track: {} of {} frames voiced",
            track.voiced().count(),
            track.len()
        );
        track
    }

    /// Autocorrelation R[0..=max_lag] through the power spectrum
    pub fn autocorrelation(&self, frame: ArrayView1<f64>) -> Vec<f64> {
        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_len];
        let mut scratch = vec![
            Complex::new(0.0, 0.0);
            self.forward
                .get_inplace_scratch_len()
                .max(self.inverse.get_inplace_scratch_len())
        ];
        self.fill_autocorrelation(frame, &mut buffer, &mut scratch);
        buffer[..=self.max_lag].iter().map(|c| c.re).collect()
    }

    fn fill_autocorrelation(
        &self,
        frame: ArrayView1<f64>,
        buffer: &mut [Complex<f64>],
        scratch: &mut [Complex<f64>],
    ) {
        buffer.fill(Complex::new(0.0, 0.0));
        for (dst, &src) in buffer.iter_mut().zip(frame.iter()) {
            *dst = Complex::new(src, 0.0);
        }
        self.forward.process_with_scratch(buffer, scratch);
        for value in buffer.iter_mut() {
            *value = Complex::new(value.norm_sqr(), 0.0);
        }
        self.inverse.process_with_scratch(buffer, scratch);

        let scale = self.fft_len as f64;
        for value in buffer.iter_mut() {
            *value /= scale;
        }
    }

    fn frame_f0(
        &self,
        frame: ArrayView1<f64>,
        buffer: &mut [Complex<f64>],
        scratch: &mut [Complex<f64>],
    ) -> f64 {
        let energy: f64 = frame.iter().map(|x| x * x).sum();
        if energy < self.config.energy_threshold || self.min_lag >= self.max_lag {
            return 0.0;
        }

        self.fill_autocorrelation(frame, buffer, scratch);
        let zero_lag = buffer[0].re;

        // First maximum wins on ties
        let (peak_lag, peak) = (self.min_lag..self.max_lag).fold(
            (self.min_lag, f64::NEG_INFINITY),
            |(best_lag, best), lag| {
                let value = buffer[lag].re;
                if value > best {
                    (lag, value)
                } else {
                    (best_lag, best)
                }
            },
        );

        if peak > self.config.voicing_threshold * zero_lag {
            self.sample_rate as f64 / peak_lag as f64
        } else {
            0.0
        }
    }
}

/// Track F0 over a waveform with a one-off tracker
pub fn estimate_pitch(waveform: &Waveform, config: PitchConfig) -> Result<PitchTrack> {
    PitchTracker::new(config, waveform.sample_rate())?.track(waveform)
}
