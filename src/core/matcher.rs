use serde::Serialize;
use std::time::Instant;

use crate::core::codec::FingerprintStringCodec;
use crate::core::error::FingerprintError;
use crate::core::fingerprint::Fingerprint;
use crate::core::similarity::{SimilarityAggregator, SimilarityReport};

/// A corpus record compared against a candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusMatch {
    pub index: usize,
    pub record: String,
    pub report: SimilarityReport,
}

/// Linear scan over a corpus snapshot, O(corpus size) per call.
///
/// Duplicate decisions always use the first record in corpus order whose mean
/// similarity exceeds the threshold; there is no ranking and no index.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusMatcher {
    aggregator: SimilarityAggregator,
}

impl CorpusMatcher {
    pub fn new(aggregator: SimilarityAggregator) -> Self {
        Self { aggregator }
    }

    pub fn aggregator(&self) -> &SimilarityAggregator {
        &self.aggregator
    }

    /// First record exceeding the threshold. Records after it are not decoded.
    pub fn first_match<S: AsRef<str>>(
        &self,
        candidate: &Fingerprint,
        corpus: &[S],
    ) -> Result<Option<CorpusMatch>, FingerprintError> {
        let start = Instant::now();
        for (index, record) in corpus.iter().enumerate() {
            let record = record.as_ref();
            let report = self.compare_record(candidate, record)?;
            if self.aggregator.is_duplicate(&report) {
                log::debug!(
                    "record {} matched with mean similarity {:.2} after {:.2?}",
                    index,
                    report.mean,
                    start.elapsed()
                );
                return Ok(Some(CorpusMatch {
                    index,
                    record: record.to_string(),
                    report,
                }));
            }
        }

        log::debug!(
            "no match among {} records ({:.2?})",
            corpus.len(),
            start.elapsed()
        );
        Ok(None)
    }

    pub fn find_duplicate<S: AsRef<str>>(
        &self,
        candidate: &Fingerprint,
        corpus: &[S],
    ) -> Result<bool, FingerprintError> {
        Ok(self.first_match(candidate, corpus)?.is_some())
    }

    /// Highest-scoring record regardless of threshold, earliest on ties.
    /// For reporting only; it never decides duplicates.
    pub fn best_match<S: AsRef<str>>(
        &self,
        candidate: &Fingerprint,
        corpus: &[S],
    ) -> Result<Option<CorpusMatch>, FingerprintError> {
        let mut best: Option<CorpusMatch> = None;
        for (index, record) in corpus.iter().enumerate() {
            let record = record.as_ref();
            let report = self.compare_record(candidate, record)?;
            if best.as_ref().is_none_or(|b| report.mean > b.report.mean) {
                best = Some(CorpusMatch {
                    index,
                    record: record.to_string(),
                    report,
                });
            }
        }
        Ok(best)
    }

    fn compare_record(
        &self,
        candidate: &Fingerprint,
        record: &str,
    ) -> Result<SimilarityReport, FingerprintError> {
        let stored = FingerprintStringCodec::decode(record)?;
        self.aggregator.compare(candidate, &stored)
    }
}

/// Whether any corpus record is a duplicate of `candidate` at `threshold`.
pub fn find_duplicate<S: AsRef<str>>(
    candidate: &Fingerprint,
    corpus: &[S],
    threshold: f64,
) -> Result<bool, FingerprintError> {
    CorpusMatcher::new(SimilarityAggregator::new(threshold)?).find_duplicate(candidate, corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::{BitSequence, FingerprintEngine};
    use crate::core::fixtures::{
        TEXTURE_31_RECORD, TEXTURE_32_RECORD, encode_jpeg, textured_grid, textured_luma,
    };
    use crate::core::pixels::{ImageDecoder, PixelSource};
    use crate::core::similarity::DEFAULT_THRESHOLD;

    /// 25-bit components with the first `ones` bits set.
    fn flat(ones: usize) -> Fingerprint {
        let seq = |n: usize| -> BitSequence { (0..25).map(|i| i < n).collect() };
        Fingerprint::new(seq(ones), seq(ones), seq(ones)).unwrap()
    }

    fn record(ones: usize) -> String {
        flat(ones).to_string()
    }

    #[test]
    fn test_empty_corpus_never_matches() {
        let candidate = flat(0);
        let corpus: Vec<String> = Vec::new();
        assert!(!find_duplicate(&candidate, &corpus, DEFAULT_THRESHOLD).unwrap());
        assert!(
            CorpusMatcher::default()
                .best_match(&candidate, &corpus)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_first_match_wins_over_better_match() {
        let candidate = flat(0);
        // 20%, 84%, 100% similar.
        let corpus = vec![record(20), record(4), record(0)];
        let matcher = CorpusMatcher::default();

        let first = matcher.first_match(&candidate, &corpus).unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.report.mean, 84.0);

        let best = matcher.best_match(&candidate, &corpus).unwrap().unwrap();
        assert_eq!(best.index, 2);
        assert_eq!(best.report.mean, 100.0);
    }

    #[test]
    fn test_threshold_equality_is_not_a_match() {
        let candidate = flat(0);
        let corpus = vec![record(5)];
        assert!(!find_duplicate(&candidate, &corpus, 80.0).unwrap());
        assert!(find_duplicate(&candidate, &corpus, 79.9).unwrap());
    }

    #[test]
    fn test_scan_stops_at_first_match() {
        let candidate = flat(0);
        let corpus = vec![record(0), "not#a#valid#record".to_string()];
        assert!(CorpusMatcher::default().find_duplicate(&candidate, &corpus).unwrap());
    }

    #[test]
    fn test_malformed_record_aborts_scan() {
        let candidate = flat(0);
        let corpus = vec!["ffff#ffff".to_string(), record(0)];
        assert!(matches!(
            CorpusMatcher::default().find_duplicate(&candidate, &corpus),
            Err(FingerprintError::MalformedFingerprintRecord { .. })
        ));
    }

    #[test]
    fn test_incompatible_record_aborts_scan() {
        let candidate = flat(0);
        let sixteen_bit = "0000#0000#0000".to_string();
        assert!(matches!(
            CorpusMatcher::default().find_duplicate(&candidate, &[sixteen_bit]),
            Err(FingerprintError::IncompatibleFingerprints { .. })
        ));
    }

    #[test]
    fn test_invalid_threshold() {
        let corpus: Vec<String> = Vec::new();
        assert!(matches!(
            find_duplicate(&flat(0), &corpus, 120.0),
            Err(FingerprintError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_reencoded_image_matches_reference_corpus() {
        let engine = FingerprintEngine::default();
        let decoder = ImageDecoder::new();
        let original = textured_luma(256, 256, 31);

        let reference = engine.compute(&decoder.decode(&encode_jpeg(&original, 92)).unwrap());
        let corpus = vec![
            engine.compute(&textured_grid(256, 256, 32)).to_string(),
            reference.to_string(),
            engine.compute(&textured_grid(256, 256, 33)).to_string(),
        ];

        let matcher = CorpusMatcher::default();
        let recompressed = engine.compute(&decoder.decode(&encode_jpeg(&original, 55)).unwrap());
        let found = matcher.first_match(&recompressed, &corpus).unwrap().unwrap();
        assert_eq!(found.index, 1);
        assert!(found.report.mean > DEFAULT_THRESHOLD);

        let unrelated = engine.compute(&textured_grid(256, 256, 34));
        assert!(!matcher.find_duplicate(&unrelated, &corpus).unwrap());
        let best = matcher.best_match(&unrelated, &corpus).unwrap().unwrap();
        assert!(best.report.mean <= DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_stored_record_corpus() {
        let engine = FingerprintEngine::default();
        let corpus = [TEXTURE_32_RECORD, TEXTURE_31_RECORD];
        let matcher = CorpusMatcher::default();

        let recompressed = ImageDecoder::new()
            .decode(&encode_jpeg(&textured_luma(256, 256, 31), 55))
            .unwrap();
        let found = matcher
            .first_match(&engine.compute(&recompressed), &corpus)
            .unwrap()
            .unwrap();
        assert_eq!(found.index, 1);

        // 402 of 768 bits agree with the seed-31 record.
        let unrelated = engine.compute(&textured_grid(256, 256, 34));
        assert!(!matcher.find_duplicate(&unrelated, &corpus).unwrap());
        let best = matcher.best_match(&unrelated, &corpus).unwrap().unwrap();
        assert_eq!(best.index, 1);
        assert_eq!(best.report.mean, 52.34375);
    }
}
