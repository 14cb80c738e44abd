//! Per-call options and read results

use serde_json::Value;

/// Options for [`Store::set`](super::Store::set)
#[derive(Debug, Clone, Copy)]
pub struct SetOptions {
    /// Take a snapshot after the write
    pub backup: bool,

    /// Check the value against its declared schema first
    pub validate: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            backup: true,
            validate: true,
        }
    }
}

impl SetOptions {
    /// Skip the snapshot (restores, imports)
    pub fn without_backup() -> Self {
        Self {
            backup: false,
            ..Self::default()
        }
    }
}

/// Options for [`Store::get`](super::Store::get)
#[derive(Debug, Clone)]
pub struct GetOptions {
    /// Returned when the key is absent or unrecoverable
    pub fallback: Option<Value>,

    /// Validate the stored value against its declared schema
    pub validate: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            fallback: None,
            validate: true,
        }
    }
}

impl GetOptions {
    pub fn with_fallback(fallback: Value) -> Self {
        Self {
            fallback: Some(fallback),
            ..Self::default()
        }
    }
}

/// Where a fetched value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Primary,
    Secondary,
    /// Primary copy was corrupt; restored from the snapshot taken at this time
    Recovered { snapshot_timestamp: u64 },
}

/// A value read through [`Store::fetch`](super::Store::fetch)
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub value: Value,
    pub source: Source,
}
