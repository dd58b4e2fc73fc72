//! Command-line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Spoken digit recognition with per-digit Gaussian HMMs
#[derive(Parser, Debug)]
#[command(name = "digitrec", version, about = "Spoken digit recognition with per-digit HMMs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding hmm_<digit>.json model files
    #[arg(long, global = true, value_name = "DIR")]
    pub models: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train one model per digit from the corpus training split
    Train {
        /// Corpus root with 0/ .. 9/ directories (overrides config)
        #[arg(long, value_name = "DIR")]
        data: Option<PathBuf>,

        /// Baum-Welch iterations (overrides config)
        #[arg(long, value_name = "N")]
        iterations: Option<usize>,

        /// Hidden states per model (overrides config)
        #[arg(long, value_name = "N")]
        states: Option<usize>,
    },

    /// Measure accuracy on the held-out split
    Evaluate {
        /// Corpus root with 0/ .. 9/ directories (overrides config)
        #[arg(long, value_name = "DIR")]
        data: Option<PathBuf>,
    },

    /// Recognise the digit spoken in a recording
    Classify {
        /// Audio file (wav, flac, mp3, ogg)
        file: PathBuf,

        /// Print the full score map as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dump the MFCC matrix of a recording
    Features {
        /// Audio file (wav, flac, mp3, ogg)
        file: PathBuf,

        /// Write the matrix as CSV instead of printing a summary
        #[arg(long, value_name = "OUT")]
        csv: Option<PathBuf>,
    },

    /// Report pitch and formants of a recording
    Analyze {
        /// Audio file (wav, flac, mp3, ogg)
        file: PathBuf,
    },
}
