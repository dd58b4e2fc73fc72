//! Train / evaluate / classify / features / analyze against a generated corpus

use digitrec_cli::commands;
use digitrec_cli::{CorpusSettings, DigitrecConfig};
use digitrec_classifier::Digit;
use digitrec_hmm::HmmConfig;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::f64::consts::PI;
use std::path::Path;

const SAMPLE_RATE: u32 = 8000;

fn write_tone(path: &Path, freq: f64, phase: f64) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for n in 0..(SAMPLE_RATE as usize * 3 / 10) {
        let t = n as f64 / SAMPLE_RATE as f64;
        let sample =
            0.4 * (2.0 * PI * freq * t + phase).sin() + 0.1 * (2.0 * PI * 2.0 * freq * t).sin();
        writer.write_sample((sample * 32767.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn config_for(root: &Path) -> DigitrecConfig {
    DigitrecConfig {
        config_path: root.join("config.toml"),
        models_dir: Some(root.join("models")),
        hmm: HmmConfig::with_states(2).iterations(3),
        corpus: CorpusSettings {
            data_dir: root.join("corpus"),
            train_limit: 2,
            test_limit: 1,
        },
        ..DigitrecConfig::default()
    }
}

#[test]
fn test_full_workflow() {
    let dir = tempfile::tempdir().unwrap();
    for digit in 0..10u8 {
        let digit_dir = dir.path().join("corpus").join(digit.to_string());
        std::fs::create_dir_all(&digit_dir).unwrap();
        let freq = 300.0 + 150.0 * digit as f64;
        for take in 0..3 {
            write_tone(&digit_dir.join(format!("{}.wav", take)), freq, take as f64 * 0.7);
        }
    }

    let config = config_for(dir.path());
    config.save().unwrap();
    let config = DigitrecConfig::load_from(dir.path().join("config.toml")).unwrap();
    let models_dir = config.resolve_models_dir().unwrap();

    let reports = commands::train(&config, &models_dir).unwrap();
    assert_eq!(reports.len(), 10);
    assert!(models_dir.join("hmm_0.json").is_file());

    let report = commands::evaluate(&config, &models_dir).unwrap();
    assert_eq!(report.total, 10);
    assert_eq!(report.failed, 0);

    let held_out = dir.path().join("corpus").join("6").join("2.wav");
    let result = commands::classify(&config, &models_dir, &held_out).unwrap();
    assert_eq!(result.scores.len(), 10);
    assert_eq!(result.label, Digit::ALL[6]);

    let features = commands::extract(&config, &held_out).unwrap();
    assert_eq!(features.ncols(), 12);
    // ceil((2400 - 200) / 80)
    assert_eq!(features.nrows(), 28);

    let csv = dir.path().join("six.csv");
    commands::write_csv(&features, &csv).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.lines().count(), 29);
}

#[test]
fn test_analyze_tone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_tone(&path, 200.0, 0.0);

    let analysis = commands::analyze(&path).unwrap();
    // (2400 - 240) / 80 frames of 30ms every 10ms
    assert_eq!(analysis.pitch_frames, 27);
    assert_eq!(analysis.voiced_frames, 27);
    let f0 = analysis.mean_f0.unwrap();
    assert!((f0 - 200.0).abs() < 1e-6, "mean F0 {}", f0);
    assert!(analysis.formants.iter().all(|&hz| hz > 90.0 && hz < 4000.0));
}

#[test]
#[ignore] // Run with: cargo test --release test_recorded_corpus -- --ignored --nocapture
fn test_recorded_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let config = DigitrecConfig {
        config_path: dir.path().join("config.toml"),
        models_dir: Some(dir.path().join("models")),
        ..DigitrecConfig::default()
    };
    assert!(
        config.corpus.data_dir.is_dir(),
        "expected recordings under {}",
        config.corpus.data_dir.display()
    );
    let models_dir = config.resolve_models_dir().unwrap();

    commands::train(&config, &models_dir).unwrap();
    let report = commands::evaluate(&config, &models_dir).unwrap();
    println!("{}", report);
    assert!(report.total > 0);
    assert!(report.accuracy() > 0.1);
}
