//! Snapshot records
//!
//! ## Snapshot Format
//! ```text
//! {
//!   "originalKey": "user_1",
//!   "value":       { ... },
//!   "timestamp":   1718000000000,
//!   "checksum":    "8f3a01c2"
//! }
//! ```
//!
//! The checksum is CRC32 over the canonical JSON of `value` (object keys in
//! sorted order), rendered as 8 lowercase hex digits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A checksummed copy of a key's value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub original_key: String,
    pub value: Value,
    pub timestamp: u64,
    pub checksum: String,
}

impl Snapshot {
    /// Snapshot `value` with a freshly computed checksum
    pub fn new(original_key: impl Into<String>, value: Value, timestamp: u64) -> Result<Self> {
        let checksum = checksum(&value)?;
        Ok(Self {
            original_key: original_key.into(),
            value,
            timestamp,
            checksum,
        })
    }

    /// True when the stored checksum matches the stored value
    ///
    /// A snapshot that fails this check is corrupt and must be skipped,
    /// never repaired.
    pub fn is_valid(&self) -> bool {
        checksum(&self.value)
            .map(|actual| actual == self.checksum)
            .unwrap_or(false)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Deterministic checksum of a value's canonical serialization
pub fn checksum(value: &Value) -> Result<String> {
    let canonical = serde_json::to_vec(value)?;
    Ok(format!("{:08x}", crc32fast::hash(&canonical)))
}

/// Listing entry for one stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub timestamp: u64,

    /// Size of the snapshot record in bytes
    pub size_bytes: usize,

    /// Whether the record parses and its checksum validates
    pub valid: bool,
}
