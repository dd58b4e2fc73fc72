//! Recording corpora laid out as `<root>/<digit>/*.wav`

use crate::digit::Digit;
use crate::error::{ClassifierError, Result};
use crate::model_set::LabelledSequences;
use digitrec_features::{FeatureConfig, FeatureSequence, MfccExtractor, Waveform};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Recordings per digit, file names sorted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DigitCorpus {
    root: PathBuf,
    files: BTreeMap<Digit, Vec<PathBuf>>,
}

/// Train/test partition of a corpus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusSplit {
    pub train: BTreeMap<Digit, Vec<PathBuf>>,
    pub test: Vec<(Digit, PathBuf)>,
}

impl DigitCorpus {
    /// Scan `root/0` .. `root/9` for `.wav` files
    ///
    /// Missing digit directories are logged and left empty. Non-digit
    /// subdirectories are ignored.
    pub fn scan<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ClassifierError::Corpus(format!(
                "Corpus directory not found: {}",
                root.display()
            )));
        }

        let mut files = BTreeMap::new();
        for digit in Digit::ALL {
            let dir = root.join(digit.to_string());
            if !dir.is_dir() {
                warn!("No directory for digit {} under {}", digit, root.display());
                continue;
            }

            let mut wavs: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_wav(path))
                .collect();
            wavs.sort();

            debug!("Digit {}: {} recordings", digit, wavs.len());
            files.insert(digit, wavs);
        }

        info!(
            "Scanned corpus {}: {} recordings",
            root.display(),
            files.values().map(Vec::len).sum::<usize>()
        );
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted recordings for `digit`
    pub fn files(&self, digit: Digit) -> &[PathBuf] {
        self.files.get(&digit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First `train_limit` files per digit for training, the next
    /// `test_limit` for testing
    pub fn split(&self, train_limit: usize, test_limit: usize) -> CorpusSplit {
        let mut split = CorpusSplit::default();
        for (&digit, files) in &self.files {
            let train_end = train_limit.min(files.len());
            let test_end = (train_end + test_limit).min(files.len());

            split.train.insert(digit, files[..train_end].to_vec());
            split
                .test
                .extend(files[train_end..test_end].iter().map(|f| (digit, f.clone())));
        }
        split
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Turns recordings into MFCC sequences
///
/// Extractors are built lazily per sample rate, since recordings are never
/// resampled.
#[derive(Debug)]
pub struct FeaturePipeline {
    config: FeatureConfig,
    extractors: HashMap<u32, MfccExtractor>,
}

impl FeaturePipeline {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            extractors: HashMap::new(),
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Features of an in-memory waveform
    pub fn extract(&mut self, waveform: &Waveform) -> Result<FeatureSequence> {
        let extractor = match self.extractors.entry(waveform.sample_rate()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let extractor = MfccExtractor::new(self.config.clone(), waveform.sample_rate())?;
                entry.insert(extractor)
            }
        };
        Ok(extractor.extract(waveform)?)
    }

    /// Load and extract one recording; silent files give zero rows
    pub fn extract_file<P: AsRef<Path>>(&mut self, path: P) -> Result<FeatureSequence> {
        let waveform = Waveform::from_file(path.as_ref())?;
        self.extract(&waveform)
    }

    /// Extract every file, skipping unreadable or empty recordings
    pub fn load_labelled(&mut self, files: &BTreeMap<Digit, Vec<PathBuf>>) -> LabelledSequences {
        let mut sequences = LabelledSequences::new();
        for (&digit, paths) in files {
            info!("Loading data for digit {}", digit);
            let mut loaded = Vec::with_capacity(paths.len());
            for path in paths {
                match self.extract_file(path) {
                    Ok(features) if features.nrows() > 0 => loaded.push(features),
                    Ok(_) => debug!("Skipping empty recording {}", path.display()),
                    Err(e) => warn!("Skipping {}: {}", path.display(), e),
                }
            }
            sequences.insert(digit, loaded);
        }
        sequences
    }
}
