//! Journal Reader
//!
//! Handles reading entries from the journal file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{DuraError, Result};

use super::{JournalEntry, HEADER_SIZE};

/// Largest payload a valid frame can carry (64 MB)
const MAX_ENTRY_SIZE: usize = 64 * 1024 * 1024;

/// Outcome of reading one frame
pub(super) enum Frame {
    Entry(JournalEntry),
    End,
    /// The file ends mid-frame (interrupted append)
    Torn(String),
    /// A complete frame failed validation
    Corrupt(String),
}

/// Reads entries from the journal file
pub struct JournalReader {
    reader: BufReader<File>,
    /// Byte offset just past the last complete, valid entry
    position: u64,
}

impl JournalReader {
    /// Open a journal file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the journal
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn tail or a CRC
    /// failure surfaces as `JournalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>> {
        match self.read_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::Torn(reason) | Frame::Corrupt(reason) => {
                Err(DuraError::JournalCorruption(reason))
            }
        }
    }

    /// Read one frame, classifying how the stream ended if it did
    pub(super) fn read_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(Frame::End);
        }
        if read < HEADER_SIZE {
            return Ok(Frame::Torn(format!(
                "partial header at offset {}: {} of {} bytes",
                self.position, read, HEADER_SIZE
            )));
        }

        let (lsn, crc, len) = JournalEntry::parse_header(&header)?;
        if len > MAX_ENTRY_SIZE {
            return Ok(Frame::Corrupt(format!(
                "implausible entry length {} at offset {}",
                len, self.position
            )));
        }

        let mut payload = vec![0u8; len];
        let read = read_full(&mut self.reader, &mut payload)?;
        if read < len {
            return Ok(Frame::Torn(format!(
                "partial payload at offset {}: {} of {} bytes",
                self.position, read, len
            )));
        }

        match JournalEntry::decode_payload(lsn, crc, &payload) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + len) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(DuraError::JournalCorruption(reason)) => Ok(Frame::Corrupt(reason)),
            Err(e) => Err(e),
        }
    }

    /// Offset just past the last entry successfully read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> JournalIterator {
        JournalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over journal entries; stops after the first error
pub struct JournalIterator {
    reader: JournalReader,
    done: bool,
}

impl Iterator for JournalIterator {
    type Item = Result<JournalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the stream allows, returning bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
