//! MFCC feature extraction
//!
//! Waveform -> pre-emphasis -> frames -> Hamming window -> |FFT|²/NFFT ->
//! mel filterbank -> ln -> orthonormal DCT-II -> first `num_ceps` columns.
//!
//! The filterbank, DCT basis and FFT plan are built once per
//! `(sample_rate, nfft, nfilt)` in [`MfccExtractor::new`] and reused for every
//! clip at that rate.

use crate::audio::Waveform;
use crate::error::{FeatureError, Result};
use crate::preprocess::{
    apply_window, frame_signal, pre_emphasis, FrameConfig, FrameGeometry, DEFAULT_PRE_EMPHASIS,
};
use ndarray::{Array2, Axis};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::debug;

/// One row per frame, one column per cepstral coefficient
pub type FeatureSequence = Array2<f64>;

/// Substituted for exact zeros before any logarithm
const LOG_FLOOR: f64 = f64::EPSILON;

/// MFCC extraction configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub frame: FrameConfig,
    /// Pre-emphasis coefficient (default: 0.97)
    pub pre_emphasis: f64,
    /// Retained cepstral coefficients (default: 12)
    pub num_ceps: usize,
    /// Number of triangular mel filters (default: 26)
    pub nfilt: usize,
    /// FFT size; frames are zero-padded or truncated to it (default: 512)
    pub nfft: usize,
    /// Keep DCT coefficient 0 (log energy) as the first column (default: true)
    ///
    /// When false the retained columns are 1..=num_ceps instead.
    pub include_energy: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            pre_emphasis: DEFAULT_PRE_EMPHASIS,
            num_ceps: 12,
            nfilt: 26,
            nfft: 512,
            include_energy: true,
        }
    }
}

impl FeatureConfig {
    pub fn frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn num_ceps(mut self, num_ceps: usize) -> Self {
        self.num_ceps = num_ceps;
        self
    }

    pub fn nfilt(mut self, nfilt: usize) -> Self {
        self.nfilt = nfilt;
        self
    }

    pub fn nfft(mut self, nfft: usize) -> Self {
        self.nfft = nfft;
        self
    }

    pub fn pre_emphasis(mut self, coef: f64) -> Self {
        self.pre_emphasis = coef;
        self
    }

    /// Drop DCT coefficient 0 and keep 1..=num_ceps
    pub fn without_energy(mut self) -> Self {
        self.include_energy = false;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.frame.validate()?;
        if self.num_ceps == 0 {
            return Err(FeatureError::config("num_ceps must be positive"));
        }
        if self.nfilt == 0 {
            return Err(FeatureError::config("nfilt must be positive"));
        }
        if self.nfft < 2 {
            return Err(FeatureError::config("nfft must be at least 2"));
        }
        if !self.pre_emphasis.is_finite() {
            return Err(FeatureError::config("pre_emphasis must be finite"));
        }

        let highest = self.first_coefficient() + self.num_ceps;
        if highest > self.nfilt {
            return Err(FeatureError::InvalidConfiguration(format!(
                "cannot keep {} cepstral coefficients (energy {}) from {} filters",
                self.num_ceps,
                if self.include_energy { "kept" } else { "dropped" },
                self.nfilt
            )));
        }

        Ok(())
    }

    fn first_coefficient(&self) -> usize {
        if self.include_energy {
            0
        } else {
            1
        }
    }
}

/// MFCC extractor bound to one sample rate
pub struct MfccExtractor {
    config: FeatureConfig,
    sample_rate: u32,
    geometry: FrameGeometry,
    /// (nfilt, nfft/2 + 1)
    filterbank: Array2<f64>,
    /// (num_ceps, nfilt), rows are the retained DCT-II basis vectors
    dct_basis: Array2<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for MfccExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfccExtractor")
            .field("config", &self.config)
            .field("sample_rate", &self.sample_rate)
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

impl MfccExtractor {
    /// Build filterbank, DCT basis and FFT plan for `sample_rate`
    pub fn new(config: FeatureConfig, sample_rate: u32) -> Result<Self> {
        config.validate()?;
        let geometry = config.frame.frame_geometry(sample_rate)?;

        let filterbank = create_mel_filterbank(sample_rate, config.nfft, config.nfilt);
        let dct_basis = create_dct_basis(config.nfilt, config.first_coefficient(), config.num_ceps);
        let fft = FftPlanner::new().plan_fft_forward(config.nfft);

        debug!(
            "MFCC extractor: {} Hz, frame {} / step {} samples, {} filters, {} ceps",
            sample_rate, geometry.frame_length, geometry.frame_step, config.nfilt, config.num_ceps
        );

        Ok(Self {
            config,
            sample_rate,
            geometry,
            filterbank,
            dct_basis,
            fft,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn filterbank(&self) -> &Array2<f64> {
        &self.filterbank
    }

    /// Output dimensionality D
    pub fn num_ceps(&self) -> usize {
        self.config.num_ceps
    }

    /// Extract features from a waveform recorded at this extractor's rate
    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureSequence> {
        if waveform.sample_rate() != self.sample_rate {
            return Err(FeatureError::InvalidConfiguration(format!(
                "extractor built for {} Hz, waveform is {} Hz",
                self.sample_rate,
                waveform.sample_rate()
            )));
        }
        Ok(self.extract_samples(waveform.samples()))
    }

    /// Extract features from raw samples at this extractor's rate
    ///
    /// An empty signal yields a `(0, num_ceps)` sequence.
    pub fn extract_samples(&self, samples: &[f32]) -> FeatureSequence {
        let emphasized = pre_emphasis(samples, self.config.pre_emphasis);
        let mut frames = frame_signal(&emphasized, self.geometry);
        if frames.nrows() == 0 {
            return Array2::zeros((0, self.config.num_ceps));
        }
        apply_window(&mut frames);

        let mut power = self.power_spectrum(&frames);
        power.mapv_inplace(|p| if p == 0.0 { LOG_FLOOR } else { p });

        let energies = power.dot(&self.filterbank.t());
        let log_energies = energies.mapv(|e| if e == 0.0 { LOG_FLOOR.ln() } else { e.ln() });

        let features = log_energies.dot(&self.dct_basis.t());
        debug!(
            "Extracted {} frames x {} coefficients from {} samples",
            features.nrows(),
            features.ncols(),
            samples.len()
        );
        features
    }

    /// |rfft(frame, nfft)|² / nfft for every frame: (num_frames, nfft/2 + 1)
    pub fn power_spectrum(&self, frames: &Array2<f64>) -> Array2<f64> {
        let nfft = self.config.nfft;
        let bins = nfft / 2 + 1;
        let mut power = Array2::zeros((frames.nrows(), bins));

        let mut buffer = vec![Complex::new(0.0, 0.0); nfft];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];

        for (frame, mut out) in frames.axis_iter(Axis(0)).zip(power.axis_iter_mut(Axis(0))) {
            buffer.fill(Complex::new(0.0, 0.0));
            for (dst, &src) in buffer.iter_mut().zip(frame.iter()) {
                *dst = Complex::new(src, 0.0);
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (dst, value) in out.iter_mut().zip(&buffer[..bins]) {
                *dst = value.norm_sqr() / nfft as f64;
            }
        }

        power
    }
}

/// One-shot extraction; builds a throwaway [`MfccExtractor`]
///
/// Prefer keeping an extractor around when processing many clips at the same
/// sample rate.
pub fn extract_features(
    samples: &[f32],
    sample_rate: u32,
    config: &FeatureConfig,
) -> Result<FeatureSequence> {
    let extractor = MfccExtractor::new(config.clone(), sample_rate)?;
    Ok(extractor.extract_samples(samples))
}

/// Convert Hz to mel scale
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert mel scale to Hz
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters equally spaced on the mel scale from 0 Hz to Nyquist
///
/// Edges are snapped to FFT bins `floor((nfft + 1) * hz / sample_rate)`.
/// Each filter rises 0 -> 1 from its left bin to its center bin and falls
/// back to 0 at its right bin. Shape: (nfilt, nfft/2 + 1).
pub fn create_mel_filterbank(sample_rate: u32, nfft: usize, nfilt: usize) -> Array2<f64> {
    let bins = nfft / 2 + 1;
    let mel_max = hz_to_mel(sample_rate as f64 / 2.0);

    let bin_points: Vec<f64> = (0..nfilt + 2)
        .map(|i| {
            let mel = mel_max * i as f64 / (nfilt + 1) as f64;
            ((nfft + 1) as f64 * mel_to_hz(mel) / sample_rate as f64).floor()
        })
        .collect();

    let mut filterbank = Array2::zeros((nfilt, bins));

    for m in 0..nfilt {
        let left = bin_points[m];
        let center = bin_points[m + 1];
        let right = bin_points[m + 2];

        for k in (left as usize..center as usize).filter(|&k| k < bins) {
            filterbank[[m, k]] = (k as f64 - left) / (center - left);
        }
        for k in (center as usize..right as usize).filter(|&k| k < bins) {
            filterbank[[m, k]] = (right - k as f64) / (right - center);
        }
    }

    filterbank
}

/// Rows `first..first + count` of the orthonormal DCT-II matrix of size `n`
///
/// X_k = s_k * Σ_n x_n cos(π k (2n + 1) / 2n), s_0 = √(1/n), s_k = √(2/n).
pub fn create_dct_basis(n: usize, first: usize, count: usize) -> Array2<f64> {
    let scale_dc = (1.0 / n as f64).sqrt();
    let scale = (2.0 / n as f64).sqrt();

    Array2::from_shape_fn((count, n), |(row, col)| {
        let k = first + row;
        let s = if k == 0 { scale_dc } else { scale };
        s * (PI * k as f64 * (2 * col + 1) as f64 / (2 * n) as f64).cos()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    #[test]
    fn test_mel_conversion() {
        let mel = hz_to_mel(1000.0);
        assert_abs_diff_eq!(mel, 999.985, epsilon = 1e-2);
        assert_abs_diff_eq!(mel_to_hz(mel), 1000.0, epsilon = 1e-9);
        assert_eq!(hz_to_mel(0.0), 0.0);
    }

    #[test]
    fn test_mel_filterbank_shape_and_peaks() {
        let filterbank = create_mel_filterbank(16000, 512, 26);
        assert_eq!(filterbank.dim(), (26, 257));
        assert!(filterbank.iter().all(|&w| (0.0..=1.0).contains(&w)));

        for row in filterbank.axis_iter(Axis(0)) {
            let peak = row.iter().cloned().fold(0.0, f64::max);
            assert_abs_diff_eq!(peak, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_dct_basis_is_orthonormal() {
        let basis = create_dct_basis(26, 0, 26);
        let gram = basis.dot(&basis.t());
        for i in 0..26 {
            for j in 0..26 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_dct_constant_input_only_dc() {
        let basis = create_dct_basis(8, 0, 4);
        let coeffs = basis.dot(&Array1::from_elem(8, 2.0));
        assert_abs_diff_eq!(coeffs[0], 2.0 * 8.0_f64.sqrt(), epsilon = 1e-12);
        for k in 1..4 {
            assert_abs_diff_eq!(coeffs[k], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(FeatureConfig::default().validate().is_ok());
        assert!(FeatureConfig::default().num_ceps(0).validate().is_err());
        assert!(FeatureConfig::default().nfilt(0).validate().is_err());
        assert!(FeatureConfig::default().num_ceps(26).validate().is_ok());
        assert!(FeatureConfig::default()
            .num_ceps(26)
            .without_energy()
            .validate()
            .is_err());
    }

    #[test]
    fn test_power_spectrum_dc() {
        let extractor = MfccExtractor::new(FeatureConfig::default(), 16000).unwrap();
        let frames = Array2::from_elem((1, 400), 1.0);
        let power = extractor.power_spectrum(&frames);
        assert_eq!(power.dim(), (1, 257));
        assert_abs_diff_eq!(power[[0, 0]], 400.0 * 400.0 / 512.0, epsilon = 1e-9);
    }

    #[test]
    fn test_energy_flag_shifts_columns() {
        let samples: Vec<f32> = (0..4000).map(|i| (i as f32 * 0.05).sin()).collect();
        let with_energy = extract_features(&samples, 16000, &FeatureConfig::default()).unwrap();
        let without_energy = extract_features(
            &samples,
            16000,
            &FeatureConfig::default().without_energy(),
        )
        .unwrap();

        assert_eq!(with_energy.dim(), without_energy.dim());
        for t in 0..with_energy.nrows() {
            for d in 0..11 {
                assert_abs_diff_eq!(with_energy[[t, d + 1]], without_energy[[t, d]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_rejects_mismatched_sample_rate() {
        let extractor = MfccExtractor::new(FeatureConfig::default(), 16000).unwrap();
        let waveform = Waveform::new(vec![0.0; 800], 8000);
        assert!(matches!(
            extractor.extract(&waveform),
            Err(FeatureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_signal_yields_empty_sequence() {
        let features = extract_features(&[], 16000, &FeatureConfig::default()).unwrap();
        assert_eq!(features.dim(), (0, 12));
    }
}
