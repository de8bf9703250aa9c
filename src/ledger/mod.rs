//! Append-only fingerprint ledgers.
//!
//! The ledger is the single source of truth for registered fingerprints. It is
//! re-read before every duplicate check and never cached, and callers must not
//! assume that a submitted record is visible to the next read.

pub mod file;
pub mod memory;

use serde::Serialize;
use thiserror::Error;

pub use file::{FileLedger, LedgerAudit, LedgerEntry};
pub use memory::MemoryLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Ledger corrupted at line {line}: {reason}")]
    Corrupted { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitReceipt {
    Appended {
        index: usize,
        digest: Option<String>,
    },
    /// The exact record string was already stored; nothing was written.
    AlreadyPresent { index: usize },
}

/// Durable store for fingerprint records.
///
/// Constructed explicitly by the caller and handed to the registry; failures
/// are reported, never retried.
pub trait LedgerClient: Send + Sync {
    fn submit(&self, record: &str) -> Result<SubmitReceipt, LedgerError>;

    /// Every stored record, in append order.
    fn fetch_all(&self) -> Result<Vec<String>, LedgerError>;
}
