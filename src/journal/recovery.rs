//! Journal Recovery
//!
//! Replays the journal after a restart or crash.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::reader::Frame;
use super::{JournalEntry, JournalReader};

/// Handles journal recovery
pub struct JournalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries encountered (CRC mismatch)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the journal has (or had) bytes past the last valid entry
    pub was_truncated: bool,

    /// Offset just past the last valid entry
    pub valid_len: u64,
}

impl JournalRecovery {
    /// Recover entries from a journal file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted entry
    /// 3. Truncate the file to the last valid entry
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<JournalEntry>, RecoveryResult)> {
        let (entries, result) = Self::scan(path)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;
            tracing::warn!(
                path = %path.display(),
                valid_len = result.valid_len,
                corrupted = result.entries_corrupted,
                "journal tail truncated"
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a journal file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::scan(path).map(|(_, result)| result)
    }

    fn scan(path: &Path) -> Result<(Vec<JournalEntry>, RecoveryResult)> {
        let file_len = std::fs::metadata(path)?.len();
        let mut reader = JournalReader::open(path)?;
        let mut entries = Vec::new();
        let mut entries_corrupted = 0;
        let mut last_lsn = 0;

        loop {
            match reader.read_frame()? {
                Frame::Entry(entry) => {
                    last_lsn = entry.lsn;
                    entries.push(entry);
                }
                Frame::End => break,
                Frame::Torn(reason) => {
                    tracing::debug!(offset = reader.position(), %reason, "journal ends mid-frame");
                    break;
                }
                Frame::Corrupt(reason) => {
                    entries_corrupted += 1;
                    tracing::debug!(offset = reader.position(), %reason, "journal frame corrupted");
                    break;
                }
            }
        }

        let valid_len = reader.position();
        let result = RecoveryResult {
            entries_recovered: entries.len() as u64,
            entries_corrupted,
            last_lsn,
            was_truncated: valid_len < file_len,
            valid_len,
        };

        Ok((entries, result))
    }
}
