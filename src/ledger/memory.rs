use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{LedgerClient, LedgerError, SubmitReceipt};

/// In-process ledger. Can be switched offline to exercise failure paths.
#[derive(Debug)]
pub struct MemoryLedger {
    records: Mutex<Vec<String>>,
    available: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_records(Vec::<String>::new())
    }

    pub fn with_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: Mutex::new(records.into_iter().map(Into::into).collect()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn ensure_available(&self) -> Result<(), LedgerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable {
                reason: "in-memory ledger is offline".to_string(),
            })
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerClient for MemoryLedger {
    fn submit(&self, record: &str) -> Result<SubmitReceipt, LedgerError> {
        self.ensure_available()?;
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(index) = records.iter().position(|r| r == record) {
            return Ok(SubmitReceipt::AlreadyPresent { index });
        }
        records.push(record.to_string());
        Ok(SubmitReceipt::Appended {
            index: records.len() - 1,
            digest: None,
        })
    }

    fn fetch_all(&self) -> Result<Vec<String>, LedgerError> {
        self.ensure_available()?;
        Ok(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_dedupe() {
        let ledger = MemoryLedger::new();
        assert_eq!(
            ledger.submit("a#b#c").unwrap(),
            SubmitReceipt::Appended {
                index: 0,
                digest: None
            }
        );
        assert_eq!(
            ledger.submit("a#b#c").unwrap(),
            SubmitReceipt::AlreadyPresent { index: 0 }
        );
        assert_eq!(ledger.fetch_all().unwrap(), vec!["a#b#c"]);
    }

    #[test]
    fn test_offline_ledger_fails_both_operations() {
        let ledger = MemoryLedger::with_records(["a#b#c"]);
        ledger.set_available(false);
        assert!(matches!(
            ledger.fetch_all(),
            Err(LedgerError::Unavailable { .. })
        ));
        assert!(matches!(
            ledger.submit("d#e#f"),
            Err(LedgerError::Unavailable { .. })
        ));
        assert_eq!(ledger.records(), vec!["a#b#c"]);
    }
}
