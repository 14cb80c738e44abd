//! Capacity Manager
//!
//! Wraps primary writes. When the medium rejects a write as over capacity,
//! expired snapshots are purged across the whole namespace and the write is
//! retried exactly once. A second rejection is returned to the caller, which
//! either overflows to the secondary store or reports the failure.

use crate::backup::{BackupManager, CleanupReport};
use crate::error::Result;
use crate::medium::Medium;

/// Capacity-aware writer for the primary medium
#[derive(Debug, Clone)]
pub struct CapacityManager {
    backups: BackupManager,
}

impl CapacityManager {
    pub fn new(backups: BackupManager) -> Self {
        Self { backups }
    }

    /// Write `value` under the physical key `key`, reclaiming space once if needed
    pub fn write(&self, medium: &mut dyn Medium, key: &str, value: &str, now: u64) -> Result<()> {
        match medium.write(key, value) {
            Err(e) if e.is_capacity_exceeded() => {
                let reclaimed = self.reclaim(medium, now)?;
                tracing::debug!(
                    key = %key,
                    freed = reclaimed.bytes_freed,
                    "primary full, retrying after cleanup"
                );
                medium.write(key, value)
            }
            other => other,
        }
    }

    /// Free space by purging expired snapshots in every key
    pub fn reclaim(&self, medium: &mut dyn Medium, now: u64) -> Result<CleanupReport> {
        self.backups.purge_expired(medium, now)
    }

    /// `used` as a percentage of `capacity`
    pub fn usage_percent(used: usize, capacity: usize) -> f64 {
        if capacity == 0 {
            return 100.0;
        }
        used as f64 / capacity as f64 * 100.0
    }
}
