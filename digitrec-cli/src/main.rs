//! digitrec - spoken digit recognition
//!
//! `train` fits one HMM per digit on `<data>/<digit>/*.wav`, `evaluate` scores
//! the held-out files, `classify` labels a single recording and `features`
//! dumps its MFCC matrix.

use anyhow::{Context, Result};
use clap::Parser;
use digitrec_cli::{commands, Cli, Commands, DigitrecConfig};
use ndarray::Axis;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let mut config = match &cli.config {
        Some(path) => DigitrecConfig::load_from(path),
        None => DigitrecConfig::load(),
    }
    .context("Failed to load configuration")?;
    info!("Configuration loaded from {}", config.config_path.display());

    if let Some(models) = &cli.models {
        config.models_dir = Some(models.clone());
    }

    match cli.command {
        Commands::Train {
            data,
            iterations,
            states,
        } => {
            if let Some(data) = data {
                config.corpus.data_dir = data;
            }
            if let Some(n_iter) = iterations {
                config.hmm.n_iter = n_iter;
            }
            if let Some(n_states) = states {
                config.hmm.n_states = n_states;
            }
            config.validate()?;

            let models_dir = config.resolve_models_dir()?;
            let reports = commands::train(&config, &models_dir)?;
            for (digit, report) in &reports {
                println!(
                    "digit {}: {} sequences, {} iterations, log-likelihood {}",
                    digit,
                    report.sequences_used,
                    report.iterations,
                    report
                        .final_log_likelihood()
                        .map(|ll| format!("{:.2}", ll))
                        .unwrap_or_else(|| "n/a".to_string())
                );
            }
            println!("Saved {} models to {}", reports.len(), models_dir.display());
        }
        Commands::Evaluate { data } => {
            if let Some(data) = data {
                config.corpus.data_dir = data;
            }
            config.validate()?;

            let models_dir = config.resolve_models_dir()?;
            let report = commands::evaluate(&config, &models_dir)?;
            println!("{}", "-".repeat(30));
            println!("{}", report);
        }
        Commands::Classify { file, json } => {
            config.validate()?;
            let models_dir = config.resolve_models_dir()?;
            let result = commands::classify(&config, &models_dir, &file)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.label);
                for (digit, score) in &result.scores {
                    info!("  {}: {:.3}", digit, score);
                }
            }
        }
        Commands::Features { file, csv } => {
            config.validate()?;
            let features = commands::extract(&config, &file)?;
            match csv {
                Some(out) => {
                    commands::write_csv(&features, &out)?;
                    println!(
                        "Wrote {} x {} features to {}",
                        features.nrows(),
                        features.ncols(),
                        out.display()
                    );
                }
                None => {
                    println!("{} frames x {} coefficients", features.nrows(), features.ncols());
                    if let Some(mean) = features.mean_axis(Axis(0)) {
                        let formatted: Vec<String> =
                            mean.iter().map(|v| format!("{:.3}", v)).collect();
                        println!("mean: [{}]", formatted.join(", "));
                    }
                }
            }
        }
        Commands::Analyze { file } => {
            let analysis = commands::analyze(&file)?;
            println!(
                "{:.2}s, {} of {} pitch frames voiced",
                analysis.duration_secs, analysis.voiced_frames, analysis.pitch_frames
            );
            match analysis.mean_f0 {
                Some(f0) => println!("mean F0: {:.1} Hz", f0),
                None => println!("mean F0: unvoiced"),
            }
            let formants: Vec<String> = analysis
                .formants
                .iter()
                .map(|hz| format!("{:.0}", hz))
                .collect();
            println!("formants (Hz): [{}]", formants.join(", "));
        }
    }

    Ok(())
}
