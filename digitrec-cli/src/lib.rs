//! digitrec command-line library
//!
//! Re-exports the CLI modules for integration testing.

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands};
pub use config::{CorpusSettings, DigitrecConfig, FeatureSettings};
