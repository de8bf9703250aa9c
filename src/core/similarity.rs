use serde::{Deserialize, Serialize};

use crate::core::distance;
use crate::core::error::FingerprintError;
use crate::core::fingerprint::{Fingerprint, HashAlgorithm};

/// Mean similarity a candidate must strictly exceed to count as a duplicate.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// Per-algorithm similarity percentages and their unweighted mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub average: f64,
    pub difference: f64,
    pub perceptual: f64,
    pub mean: f64,
}

impl SimilarityReport {
    pub fn get(&self, algorithm: HashAlgorithm) -> f64 {
        match algorithm {
            HashAlgorithm::Average => self.average,
            HashAlgorithm::Difference => self.difference,
            HashAlgorithm::Perceptual => self.perceptual,
        }
    }

    /// Strict comparison: a mean equal to the threshold is not a match.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.mean > threshold
    }
}

/// Equal-weight vote across the three hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityAggregator {
    threshold: f64,
}

impl SimilarityAggregator {
    pub fn new(threshold: f64) -> Result<Self, FingerprintError> {
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(FingerprintError::invalid_configuration(format!(
                "threshold must be within 0..=100, got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn calculate_similarity(
        &self,
        a: &Fingerprint,
        b: &Fingerprint,
        algorithm: HashAlgorithm,
    ) -> Result<f64, FingerprintError> {
        distance::similarity(a.component(algorithm), b.component(algorithm))
    }

    pub fn compare(
        &self,
        a: &Fingerprint,
        b: &Fingerprint,
    ) -> Result<SimilarityReport, FingerprintError> {
        let average = self.calculate_similarity(a, b, HashAlgorithm::Average)?;
        let difference = self.calculate_similarity(a, b, HashAlgorithm::Difference)?;
        let perceptual = self.calculate_similarity(a, b, HashAlgorithm::Perceptual)?;

        // Taken over all bits at once; exact ratios such as 80% stay exact.
        let mut differing = 0;
        for algorithm in HashAlgorithm::ALL {
            differing +=
                distance::hamming_distance(a.component(algorithm), b.component(algorithm))?;
        }
        let total = HashAlgorithm::ALL.len() * a.bit_length();

        Ok(SimilarityReport {
            average,
            difference,
            perceptual,
            mean: (total - differing) as f64 * 100.0 / total as f64,
        })
    }

    pub fn is_duplicate(&self, report: &SimilarityReport) -> bool {
        report.exceeds(self.threshold)
    }
}

impl Default for SimilarityAggregator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}
