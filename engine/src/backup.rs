//! Backup ledger for undoing the latest merge.
//!
//! Holds at most one backup: the local record set as it was immediately
//! before the most recent state-changing reconciliation. Every new backup
//! silently replaces the previous one.

use crate::{error::Result, Error, RecordSet, Timestamp};
use serde::{Deserialize, Serialize};

/// A pre-merge snapshot of the local record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// The local quotes before the merge
    pub records: RecordSet,
    /// When the backup was taken (milliseconds since epoch)
    pub taken_at: Timestamp,
}

/// Single-slot store for the latest [`Backup`].
#[derive(Debug, Clone, Default)]
pub struct BackupLedger {
    latest: Option<Backup>,
}

impl BackupLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self { latest: None }
    }

    /// Retain `records` as the latest backup, replacing any earlier one.
    pub fn retain(&mut self, records: RecordSet, taken_at: Timestamp) {
        self.latest = Some(Backup { records, taken_at });
    }

    /// Peek at the latest backup.
    pub fn latest(&self) -> Option<&Backup> {
        self.latest.as_ref()
    }

    /// Check if a backup is available.
    pub fn has_backup(&self) -> bool {
        self.latest.is_some()
    }

    /// Remove and return the latest backup.
    pub fn take(&mut self) -> Result<Backup> {
        self.latest.take().ok_or(Error::NoBackupAvailable)
    }

    /// Forget the latest backup.
    pub fn clear(&mut self) {
        self.latest = None;
    }
}
