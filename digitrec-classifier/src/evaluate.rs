//! Held-out accuracy and confusion matrix

use crate::classifier::DigitClassifier;
use crate::corpus::FeaturePipeline;
use crate::digit::Digit;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Accuracy over a labelled test set
///
/// `total` counts every attempted item, including the `failed` ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub correct: usize,
    pub failed: usize,
    /// counts[real][predicted]
    pub confusion: [[usize; 10]; 10],
}

impl EvaluationReport {
    /// Fraction correct in [0, 1]; zero for an empty run
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }

    pub fn record(&mut self, real: Digit, predicted: Digit) {
        self.total += 1;
        self.confusion[real.index()][predicted.index()] += 1;
        if real == predicted {
            self.correct += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Overall Accuracy: {:.2}% ({}/{}, {} failed)",
            self.accuracy() * 100.0,
            self.correct,
            self.total,
            self.failed
        )?;
        writeln!(f, "Confusion Matrix (Row=Real, Col=Pred):")?;
        write!(f, "    ")?;
        for digit in Digit::ALL {
            write!(f, "{:>4}", digit)?;
        }
        for digit in Digit::ALL {
            write!(f, "\n{:>4}", digit)?;
            for count in self.confusion[digit.index()] {
                write!(f, "{:>4}", count)?;
            }
        }
        Ok(())
    }
}

/// Classify every labelled feature sequence
pub fn evaluate<'a, I>(classifier: &DigitClassifier, items: I) -> EvaluationReport
where
    I: IntoIterator<Item = (Digit, ndarray::ArrayView2<'a, f64>)>,
{
    let mut report = EvaluationReport::default();
    for (real, features) in items {
        match classifier.classify(features) {
            Ok(result) => report.record(real, result.label),
            Err(e) => {
                warn!("Could not classify a sample of digit {}: {}", real, e);
                report.record_failure();
            }
        }
    }
    report
}

/// Extract and classify each test recording; failures are counted, not fatal
pub fn evaluate_files(
    classifier: &DigitClassifier,
    pipeline: &mut FeaturePipeline,
    test: &[(Digit, PathBuf)],
) -> EvaluationReport {
    let mut report = EvaluationReport::default();
    for (real, path) in test {
        let outcome = pipeline
            .extract_file(path)
            .and_then(|features| classifier.classify(features.view()));
        match outcome {
            Ok(result) => report.record(*real, result.label),
            Err(e) => {
                warn!("Error on {}: {}", path.display(), e);
                report.record_failure();
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_counts_failures() {
        let mut report = EvaluationReport::default();
        report.record(Digit::ALL[1], Digit::ALL[1]);
        report.record(Digit::ALL[2], Digit::ALL[7]);
        report.record_failure();
        report.record(Digit::ALL[3], Digit::ALL[3]);

        assert_eq!(report.total, 4);
        assert_eq!(report.correct, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.accuracy(), 0.5);
        assert_eq!(report.confusion[2][7], 1);
        assert_eq!(report.confusion.iter().flatten().sum::<usize>(), 3);
    }

    #[test]
    fn test_empty_report() {
        let report = EvaluationReport::default();
        assert_eq!(report.accuracy(), 0.0);
        assert!(report.to_string().starts_with("Overall Accuracy: 0.00% (0/0"));
    }
}
