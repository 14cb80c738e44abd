//! Journal Writer
//!
//! Handles appending entries to the journal file.
//!
//! Every append is flushed before it returns, so the file always ends on a
//! frame boundary. An append that fails part way is cut back off the file
//! before the error is returned; later appends never land after torn bytes.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::{JournalEntry, JournalRecovery, Operation};

/// Byte sink a [`JournalWriter`] appends to
///
/// Writes must land at the end of the sink, as with a file opened for append.
pub trait JournalSink: Write + Send {
    /// Make written bytes durable
    fn sync_data(&self) -> io::Result<()>;

    /// Cut the sink back to `len` bytes
    fn set_len(&self, len: u64) -> io::Result<()>;
}

impl JournalSink for File {
    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

/// Writes entries to the journal file
pub struct JournalWriter<S: JournalSink = File> {
    path: PathBuf,
    sink: S,
    /// LSN the next appended entry receives
    current_lsn: u64,
    sync_strategy: SyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// Length of the file up to the last acknowledged entry
    len: u64,
}

impl JournalWriter<File> {
    /// Open or create a journal file
    ///
    /// An existing journal is scanned to continue its LSN sequence.
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let next_lsn = if path.exists() {
            JournalRecovery::verify(path)?.last_lsn + 1
        } else {
            1
        };
        Self::open_at(path, sync_strategy, next_lsn)
    }

    /// Open a journal whose next LSN is already known (after recovery)
    pub fn open_at(path: &Path, sync_strategy: SyncStrategy, next_lsn: u64) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let len = file.seek(SeekFrom::End(0))?;

        Ok(Self::with_sink(path, file, sync_strategy, next_lsn, len))
    }
}

impl<S: JournalSink> JournalWriter<S> {
    /// Wrap a sink that already holds `len` bytes of valid journal
    pub fn with_sink(
        path: &Path,
        sink: S,
        sync_strategy: SyncStrategy,
        next_lsn: u64,
        len: u64,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            sink,
            current_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
            len,
        }
    }

    /// Append an operation, returning the LSN assigned to it
    ///
    /// On error nothing of the entry remains in the journal and its LSN is
    /// handed to the next append.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn;
        let bytes = JournalEntry::new(lsn, operation).serialize()?;

        if let Err(e) = self.write_frame(&bytes) {
            self.rewind();
            return Err(e);
        }

        self.current_lsn += 1;
        self.len += bytes.len() as u64;
        Ok(lsn)
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.sink.flush()?;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    /// Drop whatever a failed append left past the last acknowledged entry
    fn rewind(&mut self) {
        if let Err(e) = self.sink.set_len(self.len) {
            tracing::error!(len = self.len, error = %e, "journal not rewound after failed append");
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.sink.flush()?;
        self.sink.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every entry; the LSN sequence continues
    pub fn truncate(&mut self) -> Result<()> {
        self.sink.flush()?;
        self.sink.set_len(0)?;
        self.sink.sync_data()?;
        self.len = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the LSN the next entry will receive
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Current journal length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
