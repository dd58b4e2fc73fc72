//! Waveform container and audio file loading
//!
//! Recordings are read at their native sample rate and down-mixed to mono.
//! Nothing is resampled: the MFCC extractor is built for whatever rate the
//! file carries.

use crate::error::{FeatureError, Result};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as DecodeFailure;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Mono audio clip with its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Wrap already-captured samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Load a recording from disk (WAV, FLAC, MP3 or OGG)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| FeatureError::audio_load("Could not determine file extension"))?;

        match extension.to_lowercase().as_str() {
            "wav" => load_wav(path),
            "mp3" | "flac" | "ogg" => load_compressed(path),
            _ => Err(FeatureError::AudioLoad(format!(
                "Unsupported audio format: {}",
                extension
            ))),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Clip length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Append interleaved frames to `mono`, averaging across channels
fn push_mono(interleaved: &[f32], channels: usize, mono: &mut Vec<f32>) {
    if channels <= 1 {
        mono.extend_from_slice(interleaved);
        return;
    }
    mono.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
    );
}

fn load_wav(path: &Path) -> Result<Waveform> {
    let mut reader = WavReader::open(path)
        .map_err(|e| FeatureError::AudioLoad(format!("Failed to open WAV: {}", e)))?;

    let spec = reader.spec();
    debug!(
        "Loaded WAV {}: {} Hz, {} channels, {} bits",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FeatureError::AudioLoad(format!("Failed to read samples: {}", e)))?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|sample| sample as f32 / 32768.0))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FeatureError::AudioLoad(format!("Failed to read samples: {}", e)))?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|sample| sample as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FeatureError::AudioLoad(format!("Failed to read samples: {}", e)))?,
        (format, bits) => {
            return Err(FeatureError::AudioLoad(format!(
                "Unsupported WAV sample format: {:?} {} bits",
                format, bits
            )))
        }
    };

    let mut mono = Vec::with_capacity(samples.len() / usize::from(spec.channels.max(1)));
    push_mono(&samples, usize::from(spec.channels), &mut mono);
    Ok(Waveform::new(mono, spec.sample_rate))
}

fn load_compressed(path: &Path) -> Result<Waveform> {
    let file = File::open(path)
        .map_err(|e| FeatureError::AudioLoad(format!("Failed to open {}: {}", path.display(), e)))?;
    let extension = path.extension().and_then(|e| e.to_str());
    let waveform = decode_stream(Box::new(file), extension)?;
    debug!(
        "Decoded {}: {} samples at {} Hz",
        path.display(),
        waveform.len(),
        waveform.sample_rate()
    );
    Ok(waveform)
}

/// Decode the first audio track of a container into a mono waveform
///
/// A packet that fails to decode is dropped with a warning and decoding
/// carries on; the clip only fails when no packet decodes at all.
fn decode_stream(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Waveform> {
    let stream = MediaSourceStream::new(source, Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let mut container = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| FeatureError::AudioLoad(format!("Unrecognised container: {}", e)))?
        .format;

    let track = container
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| FeatureError::audio_load("Container holds no audio track"))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| FeatureError::AudioLoad(format!("No decoder for track: {}", e)))?;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut mono = Vec::new();
    let mut interleaved: Option<SampleBuffer<f32>> = None;
    let mut decoded_packets = 0usize;
    let mut dropped_packets = 0usize;

    loop {
        let packet = match container.next_packet() {
            Ok(packet) => packet,
            Err(DecodeFailure::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            // Chained streams are not followed past the first one
            Err(DecodeFailure::ResetRequired) => break,
            Err(e) => return Err(FeatureError::AudioLoad(format!("Corrupt container: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let audio = match decoder.decode(&packet) {
            Ok(audio) => audio,
            Err(DecodeFailure::DecodeError(reason)) => {
                dropped_packets += 1;
                warn!("Dropped undecodable packet: {}", reason);
                continue;
            }
            Err(e) => return Err(FeatureError::AudioLoad(format!("Decoder failed: {}", e))),
        };

        let spec = *audio.spec();
        let channels = spec.channels.count();
        if sample_rate.is_none() {
            sample_rate = Some(spec.rate);
        }

        let frames = audio.capacity();
        if interleaved
            .as_ref()
            .is_some_and(|buffer| buffer.capacity() < frames * channels)
        {
            interleaved = None;
        }
        let buffer =
            interleaved.get_or_insert_with(|| SampleBuffer::new(frames as u64, spec));
        buffer.copy_interleaved_ref(audio);
        push_mono(buffer.samples(), channels, &mut mono);
        decoded_packets += 1;
    }

    if decoded_packets == 0 && dropped_packets > 0 {
        return Err(FeatureError::AudioLoad(format!(
            "None of {} audio packets could be decoded",
            dropped_packets
        )));
    }
    if dropped_packets > 0 {
        warn!(
            "{} of {} packets dropped while decoding",
            dropped_packets,
            decoded_packets + dropped_packets
        );
    }

    let sample_rate =
        sample_rate.ok_or_else(|| FeatureError::audio_load("Stream does not declare a sample rate"))?;
    Ok(Waveform::new(mono, sample_rate))
}
