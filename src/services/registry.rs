use serde::Serialize;
use std::time::Instant;
use thiserror::Error;

use crate::core::{
    CorpusMatch, CorpusMatcher, DecodeError, Fingerprint, FingerprintEngine, FingerprintError,
    FingerprintStringCodec, ImageDecoder, PixelSource, SimilarityAggregator,
};
use crate::ledger::{LedgerClient, LedgerError, SubmitReceipt};
use crate::services::inspect::{ImageReport, InspectService};
use crate::services::upload::Upload;

pub const PUBLISHED_MESSAGE: &str = "Image published successfully";
pub const VERIFIED_MESSAGE: &str = "Image verification complete";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("File must be an image (got {media_type})")]
    UnsupportedMediaType { media_type: String },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub message: String,
    /// Transport string of the candidate's fingerprint.
    pub record: String,
    /// Whether a registered image matched, or on publish, whether the
    /// identical record was already stored.
    pub exists: bool,
    pub appended: bool,
    pub matched: Option<CorpusMatch>,
    pub receipt: Option<SubmitReceipt>,
}

/// Publishes and verifies uploads against a ledger.
///
/// The corpus is fetched fresh for every request. A failed fetch aborts the
/// request rather than being treated as an empty corpus.
pub struct Registry<L, S = ImageDecoder> {
    ledger: L,
    source: S,
    engine: FingerprintEngine,
    matcher: CorpusMatcher,
    inspector: InspectService,
}

impl<L: LedgerClient> Registry<L> {
    /// Registry decoding uploads with the `image` crate and default settings.
    pub fn with_ledger(ledger: L) -> Self {
        Self::new(
            ledger,
            ImageDecoder::new(),
            FingerprintEngine::default(),
            SimilarityAggregator::default(),
        )
    }
}

impl<L: LedgerClient, S: PixelSource> Registry<L, S> {
    pub fn new(
        ledger: L,
        source: S,
        engine: FingerprintEngine,
        aggregator: SimilarityAggregator,
    ) -> Self {
        Self {
            ledger,
            source,
            engine,
            matcher: CorpusMatcher::new(aggregator),
            inspector: InspectService::new(),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn engine(&self) -> &FingerprintEngine {
        &self.engine
    }

    pub fn matcher(&self) -> &CorpusMatcher {
        &self.matcher
    }

    pub fn fingerprint(&self, upload: &Upload) -> Result<Fingerprint, RegistryError> {
        ensure_image(upload)?;
        let grid = self.source.decode(&upload.bytes)?;
        Ok(self.engine.compute(&grid))
    }

    /// Report whether the upload matches a registered image. Never writes.
    pub fn verify(&self, upload: &Upload) -> Result<RegistrationOutcome, RegistryError> {
        let fingerprint = self.fingerprint(upload)?;
        let record = FingerprintStringCodec::encode(&fingerprint);
        let matched = self.search(&fingerprint)?;

        log::info!(
            "verified {}: {}",
            upload.name,
            if matched.is_some() { "duplicate" } else { "new" }
        );
        Ok(RegistrationOutcome {
            message: VERIFIED_MESSAGE.to_string(),
            record,
            exists: matched.is_some(),
            appended: false,
            matched,
            receipt: None,
        })
    }

    /// Register the upload unless a duplicate is already on the ledger.
    pub fn publish(&self, upload: &Upload) -> Result<RegistrationOutcome, RegistryError> {
        let fingerprint = self.fingerprint(upload)?;
        let record = FingerprintStringCodec::encode(&fingerprint);
        let matched = self.search(&fingerprint)?;

        let receipt = match &matched {
            Some(found) => {
                log::info!(
                    "{} duplicates record {} ({:.2}%); not submitting",
                    upload.name,
                    found.index,
                    found.report.mean
                );
                None
            }
            None => Some(self.ledger.submit(&record)?),
        };
        let appended = matches!(receipt, Some(SubmitReceipt::Appended { .. }));
        // At threshold 100 an identical record is not a match, but it is stored.
        let exists =
            matched.is_some() || matches!(receipt, Some(SubmitReceipt::AlreadyPresent { .. }));

        Ok(RegistrationOutcome {
            message: PUBLISHED_MESSAGE.to_string(),
            record,
            exists,
            appended,
            matched,
            receipt,
        })
    }

    /// Inspect basic image properties without touching the ledger.
    pub fn check(&self, upload: &Upload) -> Result<ImageReport, RegistryError> {
        ensure_image(upload)?;
        Ok(self.inspector.inspect(&upload.bytes)?)
    }

    fn search(&self, fingerprint: &Fingerprint) -> Result<Option<CorpusMatch>, RegistryError> {
        let start = Instant::now();
        let corpus = self.ledger.fetch_all()?;
        log::debug!("fetched {} records in {:.2?}", corpus.len(), start.elapsed());
        Ok(self.matcher.first_match(fingerprint, &corpus)?)
    }
}

fn ensure_image(upload: &Upload) -> Result<(), RegistryError> {
    if upload.is_image() {
        Ok(())
    } else {
        Err(RegistryError::UnsupportedMediaType {
            media_type: upload.media_type.clone(),
        })
    }
}
