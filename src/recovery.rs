//! Corruption Recovery
//!
//! Invoked when a primary record fails to parse or validate. Scans the key's
//! snapshots newest first and picks the first one whose checksum matches its
//! value. The chosen value is handed to a restore callback (the store writes
//! it back with snapshotting suppressed).
//!
//! A failed recovery leaves the corrupted record in place.

use serde_json::Value;

use crate::backup::BackupManager;
use crate::error::{DuraError, Result};
use crate::medium::Medium;

/// A value reconstructed from a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub snapshot_timestamp: u64,
}

/// Recover `key` from its newest valid snapshot
///
/// `restore` re-establishes the value as the primary record. A restore failure
/// is logged and the recovered value is still returned.
pub fn recover<F>(
    backups: &BackupManager,
    medium: &mut dyn Medium,
    key: &str,
    reason: &str,
    restore: F,
) -> Result<Recovered>
where
    F: FnOnce(&mut dyn Medium, &Value) -> Result<()>,
{
    tracing::warn!(key = %key, reason = %reason, "primary record failed validation");

    let Some(snapshot) = backups.newest_valid(medium, key)? else {
        tracing::warn!(key = %key, "no valid snapshot, leaving record in place");
        return Err(DuraError::CorruptionUnrecoverable(key.to_string()));
    };

    if let Err(e) = restore(medium, &snapshot.value) {
        tracing::warn!(key = %key, error = %e, "restoring recovered value failed");
    }

    tracing::info!(
        key = %key,
        snapshot = snapshot.timestamp,
        "recovered from snapshot"
    );
    Ok(Recovered {
        value: snapshot.value,
        snapshot_timestamp: snapshot.timestamp,
    })
}
