//! Perceptual image fingerprints registered on an append-only ledger.
//!
//! An image is reduced to three bit-sequence hashes (average, difference and
//! DCT-based perceptual). Publishing appends the fingerprint to a ledger unless
//! a stored fingerprint is already similar enough; verifying only reports.

pub mod config;
pub mod core;
pub mod ledger;
pub mod services;

pub use crate::config::{Config, ConfigError};
pub use crate::core::{
    Fingerprint, FingerprintEngine, FingerprintError, FingerprintStringCodec, SimilarityAggregator,
    SimilarityReport,
};
pub use crate::ledger::{FileLedger, LedgerClient, LedgerError, MemoryLedger};
pub use crate::services::{RegistrationOutcome, Registry, RegistryError, Upload};
