//! Keyspace
//!
//! Maps logical keys to physical keys under the reserved namespace prefix.
//!
//! ## Physical Layout
//! ```text
//! {prefix}{key}                          record (JSON value)
//! {prefix}__backup__{key}__{timestamp}   snapshot
//! {prefix}__metadata__                   metadata registry
//! ```
//!
//! Scope enforcement happens once, in [`Keyspace::scope`], at the facade
//! boundary. Everything below the facade only ever sees logical keys.

use crate::error::{DuraError, Result};

const RESERVED: &str = "__";
const BACKUP_TAG: &str = "__backup__";
const METADATA_TAG: &str = "__metadata__";
const TIMESTAMP_SEPARATOR: &str = "__";

/// Namespace prefix and the physical key derivations built on it
#[derive(Debug, Clone)]
pub struct Keyspace {
    prefix: String,
}

impl Keyspace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The namespace prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Normalize a caller-supplied key to a logical key
    ///
    /// A key that already carries the namespace prefix has it stripped once.
    /// Empty keys and keys in the reserved `__` space are rejected.
    pub fn scope(&self, key: &str) -> Result<String> {
        let logical = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);

        if logical.is_empty() {
            return Err(DuraError::InvalidKey(key.to_string()));
        }
        if logical.starts_with(RESERVED) {
            return Err(DuraError::InvalidKey(format!(
                "{} (keys starting with '{}' are reserved)",
                key, RESERVED
            )));
        }
        Ok(logical.to_string())
    }

    /// Physical key of a record
    pub fn record_key(&self, logical: &str) -> String {
        format!("{}{}", self.prefix, logical)
    }

    /// Physical key of the metadata registry
    pub fn metadata_key(&self) -> String {
        format!("{}{}", self.prefix, METADATA_TAG)
    }

    /// Physical key of a snapshot taken at `timestamp`
    ///
    /// The timestamp is zero-padded so lexical and numeric order agree.
    pub fn snapshot_key(&self, logical: &str, timestamp: u64) -> String {
        format!("{}{:020}", self.snapshot_prefix(logical), timestamp)
    }

    /// Common prefix of every snapshot key for `logical`
    pub fn snapshot_prefix(&self, logical: &str) -> String {
        format!(
            "{}{}{}{}",
            self.prefix, BACKUP_TAG, logical, TIMESTAMP_SEPARATOR
        )
    }

    /// Common prefix of every snapshot key in the namespace
    pub fn all_snapshots_prefix(&self) -> String {
        format!("{}{}", self.prefix, BACKUP_TAG)
    }

    /// Split a physical snapshot key into `(logical, timestamp)`
    pub fn parse_snapshot_key(&self, physical: &str) -> Option<(String, u64)> {
        let rest = physical.strip_prefix(self.all_snapshots_prefix().as_str())?;
        let (logical, ts) = rest.rsplit_once(TIMESTAMP_SEPARATOR)?;
        if logical.is_empty() || ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((logical.to_string(), ts.parse().ok()?))
    }

    /// Logical key of a physical record key, `None` for reserved keys
    pub fn logical_of_record(&self, physical: &str) -> Option<String> {
        let logical = physical.strip_prefix(self.prefix.as_str())?;
        if logical.is_empty() || logical.starts_with(RESERVED) {
            return None;
        }
        Some(logical.to_string())
    }
}
