//! Journal-backed medium
//!
//! Durable medium whose state lives in memory and in an append-only journal.
//!
//! ## Lifecycle
//! 1. `open` replays `{dir}/primary.journal`, truncating a torn tail
//! 2. every write/delete appends one journal entry, then updates memory
//! 3. once the journal outgrows the live set it is compacted: the live set
//!    is rewritten into a temp file which atomically replaces the journal

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{DuraError, Result};
use crate::journal::{JournalRecovery, JournalWriter, Operation};

use super::{entry_cost, Medium};

/// Durable, bounded medium backed by a journal file
pub struct JournalMedium {
    /// Live data, rebuilt from the journal on open
    data: BTreeMap<String, String>,

    /// Live bytes
    used: usize,

    /// Maximum live bytes
    capacity: usize,

    /// Journal appender
    writer: JournalWriter,

    /// Path of the journal file
    path: PathBuf,

    sync_strategy: SyncStrategy,

    /// Journal length that always permits compaction
    compaction_min_bytes: u64,
}

impl JournalMedium {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const JOURNAL_FILENAME: &'static str = "primary.journal";
    const COMPACT_SUFFIX: &'static str = "compact";

    /// Default compaction threshold (256 KB)
    const DEFAULT_COMPACTION_MIN_BYTES: u64 = 256 * 1024;

    /// Open or create the medium in `dir`
    pub fn open(dir: &Path, capacity: usize, sync_strategy: SyncStrategy) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::JOURNAL_FILENAME);

        // A leftover compaction file means a crash before the rename; the
        // journal it would have replaced is still authoritative.
        let stale = path.with_extension(Self::COMPACT_SUFFIX);
        if stale.exists() {
            fs::remove_file(&stale)?;
        }

        let mut data = BTreeMap::new();
        let mut next_lsn = 1;

        if path.exists() {
            let (entries, result) = JournalRecovery::recover(&path)?;

            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    "primary journal replayed"
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        match (String::from_utf8(key), String::from_utf8(value)) {
                            (Ok(key), Ok(value)) => {
                                data.insert(key, value);
                            }
                            _ => tracing::warn!(lsn = entry.lsn, "skipping non-UTF-8 journal entry"),
                        }
                    }
                    Operation::Delete { key } => {
                        if let Ok(key) = String::from_utf8(key) {
                            data.remove(&key);
                        }
                    }
                }
            }
            next_lsn = result.last_lsn + 1;
        }

        let used = data.iter().map(|(k, v)| entry_cost(k, v)).sum();
        if used > capacity {
            tracing::warn!(used, capacity, "primary journal holds more than its capacity");
        }

        let writer = JournalWriter::open_at(&path, sync_strategy, next_lsn)?;

        Ok(Self {
            data,
            used,
            capacity,
            writer,
            path,
            sync_strategy,
            compaction_min_bytes: Self::DEFAULT_COMPACTION_MIN_BYTES,
        })
    }

    /// Set the journal length that always permits compaction
    pub fn with_compaction_min_bytes(mut self, bytes: u64) -> Self {
        self.compaction_min_bytes = bytes;
        self
    }

    /// Path of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current journal length in bytes
    pub fn journal_len(&self) -> u64 {
        self.writer.len()
    }

    /// Rewrite the journal so it holds exactly the live set
    pub fn compact(&mut self) -> Result<()> {
        let before = self.writer.len();
        let temp = self.path.with_extension(Self::COMPACT_SUFFIX);
        if temp.exists() {
            fs::remove_file(&temp)?;
        }

        {
            let mut compacted = JournalWriter::open_at(
                &temp,
                SyncStrategy::EveryNEntries { count: usize::MAX },
                1,
            )?;
            for (key, value) in &self.data {
                compacted.append(Operation::Put {
                    key: key.as_bytes().to_vec(),
                    value: value.as_bytes().to_vec(),
                })?;
            }
            compacted.sync()?;
        }

        fs::rename(&temp, &self.path)?;
        self.writer =
            JournalWriter::open_at(&self.path, self.sync_strategy, self.data.len() as u64 + 1)?;

        tracing::debug!(before, after = self.writer.len(), "primary journal compacted");
        Ok(())
    }

    /// Compact when the journal outgrows the live set; a failed compaction
    /// leaves the (still valid) long journal in place
    fn maybe_compact(&mut self) {
        let threshold = self.compaction_min_bytes.max(2 * self.used as u64);
        if self.writer.len() > threshold {
            if let Err(e) = self.compact() {
                tracing::warn!(error = %e, "primary journal compaction failed");
            }
        }
    }
}

impl Medium for JournalMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let old_cost = self.data.get(key).map(|v| entry_cost(key, v)).unwrap_or(0);
        let new_cost = entry_cost(key, value);
        let projected = self.used - old_cost + new_cost;

        if projected > self.capacity && new_cost > old_cost {
            return Err(DuraError::CapacityExceeded {
                key: key.to_string(),
                needed: new_cost - old_cost,
                available: self.capacity.saturating_sub(self.used),
            });
        }

        // Journal first: memory only changes once the entry is on disk
        self.writer.append(Operation::Put {
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
        })?;

        self.data.insert(key.to_string(), value.to_string());
        self.used = projected;
        self.maybe_compact();
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        if !self.data.contains_key(key) {
            return Ok(false);
        }

        self.writer.append(Operation::Delete {
            key: key.as_bytes().to_vec(),
        })?;

        if let Some(value) = self.data.remove(key) {
            self.used -= entry_cost(key, &value);
        }
        self.maybe_compact();
        Ok(true)
    }

    fn keys(&self, prefix: &str) -> Vec<String> {
        self.data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn used_bytes(&self) -> usize {
        self.used
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.sync()
    }
}
