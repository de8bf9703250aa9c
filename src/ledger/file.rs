//! Local append-only ledger: one JSON entry per line, hash-chained with BLAKE3.
//!
//! Each entry commits to its index, timestamp, record and the previous
//! entry's digest, so `audit` can tell when history was rewritten.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{LedgerClient, LedgerError, SubmitReceipt};

pub const LEDGER_ENTRY_DOMAIN: &[u8] = b"PXLPROOF_LEDGER_ENTRY_V1";
pub const GENESIS_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub index: u64,
    pub record: String,
    pub recorded_at: String,
    pub prev_digest: String,
    pub digest: String,
}

impl LedgerEntry {
    fn new(index: u64, record: &str, prev_digest: &str) -> Self {
        let recorded_at = Utc::now().to_rfc3339();
        let digest = entry_digest(index, &recorded_at, prev_digest, record);
        Self {
            index,
            record: record.to_string(),
            recorded_at,
            prev_digest: prev_digest.to_string(),
            digest,
        }
    }
}

/// Digest over the domain tag and length-prefixed entry fields.
pub fn entry_digest(index: u64, recorded_at: &str, prev_digest: &str, record: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(LEDGER_ENTRY_DOMAIN);
    hasher.update(&index.to_le_bytes());
    for field in [recorded_at, prev_digest, record] {
        hasher.update(&(field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub entries: usize,
    pub head: String,
    /// First entry whose chain link does not verify.
    pub broken_at: Option<u64>,
    pub reason: Option<String>,
}

impl LedgerAudit {
    pub fn is_intact(&self) -> bool {
        self.broken_at.is_none()
    }
}

/// Ledger contents as read from disk.
struct Snapshot {
    entries: Vec<LedgerEntry>,
    /// Byte length covered by complete, newline-terminated entries.
    committed_len: u64,
    /// An unterminated trailing line was left by an interrupted append.
    torn: bool,
}

/// Append-only ledger file.
///
/// Appends hold an exclusive OS lock on the file for the whole
/// read-check-append, so separate handles and processes sharing one path
/// keep a single chain. A trailing line without a newline is an append that
/// never completed: readers ignore it and the next append truncates it.
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All committed entries in append order. A ledger file that does not exist yet is empty.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.snapshot()?.entries)
    }

    /// Re-derive every digest and check each entry links to its predecessor.
    pub fn audit(&self) -> Result<LedgerAudit, LedgerError> {
        let entries = self.entries()?;
        let mut head = GENESIS_DIGEST.to_string();

        for (position, entry) in entries.iter().enumerate() {
            let broken = if entry.index != position as u64 {
                Some(format!("expected index {}, found {}", position, entry.index))
            } else if entry.prev_digest != head {
                Some("previous digest does not match chain head".to_string())
            } else if entry.digest
                != entry_digest(entry.index, &entry.recorded_at, &entry.prev_digest, &entry.record)
            {
                Some("digest does not match entry contents".to_string())
            } else {
                None
            };

            if let Some(reason) = broken {
                log::warn!("ledger {} broken at entry {}: {}", self.path.display(), position, reason);
                return Ok(LedgerAudit {
                    entries: entries.len(),
                    head,
                    broken_at: Some(position as u64),
                    reason: Some(reason),
                });
            }
            head = entry.digest.clone();
        }

        Ok(LedgerAudit {
            entries: entries.len(),
            head,
            broken_at: None,
            reason: None,
        })
    }

    fn snapshot(&self) -> Result<Snapshot, LedgerError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Snapshot {
                    entries: Vec::new(),
                    committed_len: 0,
                    torn: false,
                });
            }
            Err(e) => return Err(self.unavailable("read", e)),
        };

        let mut entries = Vec::new();
        let mut offset = 0;
        let mut line_number = 0;
        while offset < bytes.len() {
            line_number += 1;
            let rest = &bytes[offset..];
            let Some(end) = rest.iter().position(|&b| b == b'\n') else {
                if !rest.iter().all(u8::is_ascii_whitespace) {
                    log::warn!(
                        "ignoring unterminated line {} in {} ({} bytes)",
                        line_number,
                        self.path.display(),
                        rest.len()
                    );
                    return Ok(Snapshot {
                        entries,
                        committed_len: offset as u64,
                        torn: true,
                    });
                }
                break;
            };

            let line = &rest[..end];
            offset += end + 1;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let entry: LedgerEntry =
                serde_json::from_slice(line).map_err(|e| LedgerError::Corrupted {
                    line: line_number,
                    reason: e.to_string(),
                })?;
            entries.push(entry);
        }

        Ok(Snapshot {
            entries,
            committed_len: bytes.len() as u64,
            torn: false,
        })
    }

    fn open_locked(&self) -> Result<File, LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.unavailable("create directory for", e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.unavailable("open", e))?;
        file.lock().map_err(|e| self.unavailable("lock", e))?;
        Ok(file)
    }

    fn append(&self, file: &mut File, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(entry).map_err(|e| LedgerError::Unavailable {
            reason: format!("failed to serialize ledger entry: {}", e),
        })?;
        line.push(b'\n');

        // One write per entry; a crash leaves at most one unterminated line.
        file.write_all(&line).map_err(|e| self.unavailable("write", e))?;
        file.sync_all().map_err(|e| self.unavailable("sync", e))?;
        Ok(())
    }

    fn unavailable(&self, action: &str, error: std::io::Error) -> LedgerError {
        LedgerError::Unavailable {
            reason: format!("failed to {} {}: {}", action, self.path.display(), error),
        }
    }
}

impl LedgerClient for FileLedger {
    fn submit(&self, record: &str) -> Result<SubmitReceipt, LedgerError> {
        // Released when `file` drops.
        let mut file = self.open_locked()?;
        let snapshot = self.snapshot()?;
        let entries = &snapshot.entries;

        if let Some(existing) = entries.iter().position(|e| e.record == record) {
            log::info!("record already stored at index {}; skipping append", existing);
            return Ok(SubmitReceipt::AlreadyPresent { index: existing });
        }

        if snapshot.torn {
            file.set_len(snapshot.committed_len)
                .map_err(|e| self.unavailable("truncate", e))?;
            log::warn!(
                "discarded interrupted append at byte {} of {}",
                snapshot.committed_len,
                self.path.display()
            );
        }

        let prev_digest = entries
            .last()
            .map(|e| e.digest.as_str())
            .unwrap_or(GENESIS_DIGEST);
        let entry = LedgerEntry::new(entries.len() as u64, record, prev_digest);
        self.append(&mut file, &entry)?;

        log::info!(
            "appended record {} to {} ({})",
            entry.index,
            self.path.display(),
            entry.digest
        );
        Ok(SubmitReceipt::Appended {
            index: entries.len(),
            digest: Some(entry.digest),
        })
    }

    fn fetch_all(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.entries()?.into_iter().map(|e| e.record).collect())
    }
}
