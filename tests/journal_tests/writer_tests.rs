//! Tests for the journal writer
//!
//! These tests verify:
//! - LSN generation and sequencing
//! - Continuing the sequence after reopening
//! - Sync strategies
//! - Truncation
//! - Rewinding after a failed append

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use durastore::config::SyncStrategy;
use durastore::journal::{JournalReader, JournalRecovery, JournalSink, JournalWriter, Operation};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_journal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.journal");
    (temp_dir, path)
}

fn put(i: usize) -> Operation {
    Operation::Put {
        key: format!("key{}", i).into_bytes(),
        value: format!("val{}", i).into_bytes(),
    }
}

/// File sink that, when armed, writes half of the next buffer and fails
struct FaultySink {
    file: File,
    fail_next: Arc<AtomicBool>,
}

impl Write for FaultySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            self.file.write_all(&buf[..buf.len() / 2])?;
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl JournalSink for FaultySink {
    fn sync_data(&self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }
}

fn faulty_writer(path: &PathBuf) -> (JournalWriter<FaultySink>, Arc<AtomicBool>) {
    let file = OpenOptions::new().create(true).append(true).open(path).unwrap();
    let fail_next = Arc::new(AtomicBool::new(false));
    let sink = FaultySink {
        file,
        fail_next: Arc::clone(&fail_next),
    };
    (
        JournalWriter::with_sink(path, sink, SyncStrategy::EveryWrite, 1, 0),
        fail_next,
    )
}

// =============================================================================
// Basic Writing Tests
// =============================================================================

#[test]
fn test_write_single_entry() {
    let (_temp, path) = setup_temp_journal();

    let mut writer = JournalWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
    let lsn = writer.append(put(1)).unwrap();

    assert_eq!(lsn, 1);
    assert_eq!(writer.current_lsn(), 2);
    assert!(!writer.is_empty());
}

#[test]
fn test_lsn_sequential() {
    let (_temp, path) = setup_temp_journal();

    let mut writer = JournalWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
    let lsns: Vec<u64> = (0..50).map(|i| writer.append(put(i)).unwrap()).collect();

    for (i, lsn) in lsns.iter().enumerate() {
        assert_eq!(*lsn, (i + 1) as u64);
    }
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, path) = setup_temp_journal();

    {
        let mut writer = JournalWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
        for i in 0..3 {
            writer.append(put(i)).unwrap();
        }
    }

    let mut writer = JournalWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 4);
    assert_eq!(writer.append(put(9)).unwrap(), 4);
}

#[test]
fn test_len_tracks_file_size() {
    let (_temp, path) = setup_temp_journal();

    let mut writer = JournalWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
    writer.append(put(1)).unwrap();
    writer.append(put(2)).unwrap();

    assert_eq!(writer.len(), std::fs::metadata(&path).unwrap().len());
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_every_n_entries_is_readable_before_sync() {
    let (_temp, path) = setup_temp_journal();

    let mut writer =
        JournalWriter::open(&path, SyncStrategy::EveryNEntries { count: 100 }).unwrap();
    for i in 0..5 {
        writer.append(put(i)).unwrap();
    }

    // Appends are flushed to the OS even when not yet fsynced
    let reader = JournalReader::open(&path).unwrap();
    assert_eq!(reader.entries().count(), 5);
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_truncate_discards_entries_keeps_sequence() {
    let (_temp, path) = setup_temp_journal();

    let mut writer = JournalWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
    writer.append(put(1)).unwrap();
    writer.append(put(2)).unwrap();
    writer.truncate().unwrap();

    assert!(writer.is_empty());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(writer.append(put(3)).unwrap(), 3);

    let entries: Vec<_> = JournalReader::open(&path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 3);
}

// =============================================================================
// Failed Append Tests
// =============================================================================

#[test]
fn test_failed_append_leaves_no_torn_bytes() {
    let (_temp, path) = setup_temp_journal();
    let (mut writer, fail_next) = faulty_writer(&path);

    writer.append(put(1)).unwrap();
    let len_before = writer.len();

    fail_next.store(true, Ordering::SeqCst);
    assert!(writer.append(put(2)).is_err());

    assert_eq!(writer.len(), len_before);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), len_before);
    assert_eq!(writer.current_lsn(), 2);
}

#[test]
fn test_appends_after_failure_survive_recovery() {
    let (_temp, path) = setup_temp_journal();
    let (mut writer, fail_next) = faulty_writer(&path);

    writer.append(put(1)).unwrap();
    fail_next.store(true, Ordering::SeqCst);
    assert!(writer.append(put(2)).is_err());
    assert_eq!(writer.append(put(3)).unwrap(), 2);
    drop(writer);

    let (entries, result) = JournalRecovery::recover(&path).unwrap();

    assert!(!result.was_truncated);
    assert_eq!(result.entries_corrupted, 0);
    let keys: Vec<Vec<u8>> = entries
        .into_iter()
        .map(|e| match e.operation {
            Operation::Put { key, .. } => key,
            Operation::Delete { key } => key,
        })
        .collect();
    assert_eq!(keys, vec![b"key1".to_vec(), b"key3".to_vec()]);
}
