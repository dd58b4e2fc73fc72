//! Subcommand implementations

use crate::config::DigitrecConfig;
use anyhow::{Context, Result};
use digitrec_classifier::{
    evaluate_files, Classification, Digit, DigitClassifier, DigitCorpus, EvaluationReport,
    FeaturePipeline, ModelSet,
};
use digitrec_features::lpc::DEFAULT_LPC_ORDER;
use digitrec_features::{
    estimate_pitch, FeatureSequence, FrameConfig, LpcAnalyzer, PitchConfig, Waveform,
};
use digitrec_hmm::TrainingReport;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Scan the corpus, train every digit model and save the set
pub fn train(
    config: &DigitrecConfig,
    models_dir: &Path,
) -> Result<BTreeMap<Digit, TrainingReport>> {
    let corpus = DigitCorpus::scan(&config.corpus.data_dir)
        .with_context(|| format!("Failed to scan {}", config.corpus.data_dir.display()))?;
    let split = corpus.split(config.corpus.train_limit, config.corpus.test_limit);

    let mut pipeline = FeaturePipeline::new(config.features.to_feature_config())
        .context("Invalid feature configuration")?;
    let training = pipeline.load_labelled(&split.train);

    let (models, reports) =
        ModelSet::train(&training, &config.hmm).context("Failed to train digit models")?;

    models
        .save_dir(models_dir)
        .with_context(|| format!("Failed to save models to {}", models_dir.display()))?;

    for (digit, report) in &reports {
        if report.has_degenerate_states() {
            warn!(
                "Digit {}: {} degenerate state updates",
                digit,
                report.degenerate.len()
            );
        }
    }
    info!("Training Complete!");
    Ok(reports)
}

/// Classify the held-out split with saved models
pub fn evaluate(config: &DigitrecConfig, models_dir: &Path) -> Result<EvaluationReport> {
    let classifier = load_classifier(models_dir)?;

    let corpus = DigitCorpus::scan(&config.corpus.data_dir)
        .with_context(|| format!("Failed to scan {}", config.corpus.data_dir.display()))?;
    let split = corpus.split(config.corpus.train_limit, config.corpus.test_limit);
    info!(
        "Evaluating {} held-out recordings ({} per digit after the first {})",
        split.test.len(),
        config.corpus.test_limit,
        config.corpus.train_limit
    );

    let mut pipeline = FeaturePipeline::new(config.features.to_feature_config())
        .context("Invalid feature configuration")?;
    Ok(evaluate_files(&classifier, &mut pipeline, &split.test))
}

/// Recognise the digit in a single recording
pub fn classify(config: &DigitrecConfig, models_dir: &Path, file: &Path) -> Result<Classification> {
    let classifier = load_classifier(models_dir)?;
    let features = extract(config, file)?;
    classifier
        .classify(features.view())
        .with_context(|| format!("Failed to classify {}", file.display()))
}

/// MFCC matrix of a recording
pub fn extract(config: &DigitrecConfig, file: &Path) -> Result<FeatureSequence> {
    let mut pipeline = FeaturePipeline::new(config.features.to_feature_config())
        .context("Invalid feature configuration")?;
    pipeline
        .extract_file(file)
        .with_context(|| format!("Failed to extract features from {}", file.display()))
}

/// Write one CSV row per frame
pub fn write_csv(features: &FeatureSequence, out: &Path) -> Result<()> {
    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut writer = BufWriter::new(file);

    let header: Vec<String> = (0..features.ncols()).map(|c| format!("c{}", c)).collect();
    writeln!(writer, "{}", header.join(","))?;
    for row in features.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// Pitch and formant summary of a recording
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceAnalysis {
    pub duration_secs: f64,
    pub pitch_frames: usize,
    pub voiced_frames: usize,
    pub mean_f0: Option<f64>,
    /// Formants of the LPC frame with the largest gain
    pub formants: Vec<f64>,
}

/// Track pitch and estimate formants of a recording
pub fn analyze(file: &Path) -> Result<VoiceAnalysis> {
    let waveform = Waveform::from_file(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    let track = estimate_pitch(&waveform, PitchConfig::default())?;

    let analyzer = LpcAnalyzer::new(waveform.sample_rate(), DEFAULT_LPC_ORDER)?;
    let frames = analyzer.analyze_waveform(&waveform, FrameConfig::default())?;
    let formants = frames
        .iter()
        .filter(|lpc| !lpc.is_silent())
        .max_by(|a, b| a.gain.total_cmp(&b.gain))
        .map(|lpc| analyzer.formants(lpc))
        .unwrap_or_default();

    Ok(VoiceAnalysis {
        duration_secs: waveform.duration_secs(),
        pitch_frames: track.len(),
        voiced_frames: track.voiced().count(),
        mean_f0: track.mean_voiced_f0(),
        formants,
    })
}

fn load_classifier(models_dir: &Path) -> Result<DigitClassifier> {
    let models = ModelSet::load_dir(models_dir).with_context(|| {
        format!(
            "No models found in {}! Run `digitrec train` first.",
            models_dir.display()
        )
    })?;
    Ok(DigitClassifier::new(models)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use digitrec_features::lpc::DEFAULT_LPC_ORDER;
use digitrec_features::{
    estimate_pitch, FeatureSequence, FrameConfig, LpcAnalyzer, PitchConfig, Waveform,
};

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("features.csv");
        let features = FeatureSequence::from_shape_vec((2, 3), vec![1.0, -0.5, 2.25, 0.0, 3.0, 4.5])
            .unwrap();

        write_csv(&features, &out).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text, "c0,c1,c2\n1,-0.5,2.25\n0,3,4.5\n");
    }

    #[test]
    fn test_analyze_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = analyze(&dir.path().join("absent.wav")).unwrap_err();
        assert!(err.to_string().contains("Failed to load"));
    }

    #[test]
    fn test_evaluate_without_models_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = DigitrecConfig {
            config_path: dir.path().join("config.toml"),
            ..DigitrecConfig::default()
        };
        let err = evaluate(&config, dir.path()).unwrap_err();
        assert!(err.to_string().contains("No models found"));
    }
}
