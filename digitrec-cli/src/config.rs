//! Configuration management

use anyhow::{Context, Result};
use digitrec_features::{FeatureConfig, FrameConfig};
use digitrec_hmm::HmmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// MFCC settings as written in `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// Frame length in seconds
    pub frame_size: f64,
    /// Hop between frames in seconds
    pub frame_stride: f64,
    pub pre_emphasis: f64,
    pub num_ceps: usize,
    pub nfilt: usize,
    pub nfft: usize,
    /// Keep the 0th (energy) cepstral coefficient
    pub include_energy: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self::from(&FeatureConfig::default())
    }
}

impl From<&FeatureConfig> for FeatureSettings {
    fn from(config: &FeatureConfig) -> Self {
        Self {
            frame_size: config.frame.frame_size,
            frame_stride: config.frame.frame_stride,
            pre_emphasis: config.pre_emphasis,
            num_ceps: config.num_ceps,
            nfilt: config.nfilt,
            nfft: config.nfft,
            include_energy: config.include_energy,
        }
    }
}

impl FeatureSettings {
    pub fn to_feature_config(&self) -> FeatureConfig {
        let config = FeatureConfig::default()
            .frame(
                FrameConfig::default()
                    .frame_size(self.frame_size)
                    .frame_stride(self.frame_stride),
            )
            .pre_emphasis(self.pre_emphasis)
            .num_ceps(self.num_ceps)
            .nfilt(self.nfilt)
            .nfft(self.nfft);

        if self.include_energy {
            config
        } else {
            config.without_energy()
        }
    }
}

/// Where recordings live and how they are split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Root holding `0/` .. `9/` directories of WAV files
    pub data_dir: PathBuf,
    /// Files per digit used for training
    pub train_limit: usize,
    /// Files per digit after the training ones used for testing
    pub test_limit: usize,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("zero_to_nine_voice"),
            train_limit: 30,
            test_limit: 20,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitrecConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory for `hmm_<digit>.json` (None = platform models dir)
    pub models_dir: Option<PathBuf>,

    pub features: FeatureSettings,

    pub hmm: HmmConfig,

    pub corpus: CorpusSettings,
}

impl Default for DigitrecConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            models_dir: None,
            features: FeatureSettings::default(),
            hmm: HmmConfig::default(),
            corpus: CorpusSettings::default(),
        }
    }
}

impl DigitrecConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref().to_path_buf();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

            let mut config: DigitrecConfig =
                toml::from_str(&contents).context("Failed to parse config file")?;

            config.config_path = config_path;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Resolve the models directory, falling back to the platform default
    pub fn resolve_models_dir(&self) -> Result<PathBuf> {
        match &self.models_dir {
            Some(dir) => Ok(dir.clone()),
            None => digitrec_paths::get_models_dir(),
        }
    }

    /// Validate feature and HMM settings together
    pub fn validate(&self) -> Result<()> {
        self.features
            .to_feature_config()
            .validate()
            .context("Invalid [features] section")?;
        self.hmm.validate().context("Invalid [hmm] section")?;
        Ok(())
    }

    fn default_config_path() -> PathBuf {
        digitrec_paths::get_config_file()
            .unwrap_or_else(|_| PathBuf::from(digitrec_paths::CONFIG_FILE_NAME))
    }
}
