//! Journal entry definitions
//!
//! Defines the structure and framing of individual journal entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{DuraError, Result};

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be journaled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl JournalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as `[lsn][crc][len][payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let crc = crc32fast::hash(&payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);

        Ok(bytes)
    }

    /// Decode a complete frame, validating CRC and header/payload agreement
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (lsn, crc, len) = Self::parse_header(bytes)?;

        let payload = bytes.get(HEADER_SIZE..HEADER_SIZE + len).ok_or_else(|| {
            DuraError::JournalCorruption(format!(
                "truncated payload: expected {} bytes, got {}",
                len,
                bytes.len().saturating_sub(HEADER_SIZE)
            ))
        })?;

        Self::decode_payload(lsn, crc, payload)
    }

    /// Split a header into `(lsn, crc, payload_len)`
    pub fn parse_header(bytes: &[u8]) -> Result<(u64, u32, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(DuraError::JournalCorruption(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&bytes[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[12..16]);

        Ok((
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len) as usize,
        ))
    }

    /// Verify and decode a payload read separately from its header
    pub fn decode_payload(lsn: u64, crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(payload);
        if actual != crc {
            return Err(DuraError::JournalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:08x}, computed {:08x}",
                lsn, crc, actual
            )));
        }

        let entry: JournalEntry = bincode::deserialize(payload)
            .map_err(|e| DuraError::JournalCorruption(format!("undecodable payload: {}", e)))?;

        if entry.lsn != lsn {
            return Err(DuraError::JournalCorruption(format!(
                "LSN mismatch: header {}, payload {}",
                lsn, entry.lsn
            )));
        }

        Ok(entry)
    }

    /// Key touched by this entry
    pub fn key(&self) -> &[u8] {
        match &self.operation {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}
