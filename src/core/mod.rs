pub mod codec;
pub mod distance;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod pixels;
pub mod similarity;

#[cfg(test)]
pub(crate) mod fixtures;

pub use codec::FingerprintStringCodec;
pub use error::FingerprintError;
pub use fingerprint::{
    BitSequence, DEFAULT_RESOLUTION, Fingerprint, FingerprintEngine, HashAlgorithm,
    compute_fingerprint,
};
pub use matcher::{CorpusMatch, CorpusMatcher, find_duplicate};
pub use pixels::{DecodeError, ImageDecoder, PixelGrid, PixelSource};
pub use similarity::{DEFAULT_THRESHOLD, SimilarityAggregator, SimilarityReport};
