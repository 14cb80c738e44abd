//! Backup Manager
//!
//! Takes a checksummed [`Snapshot`] of a key's value on every committed
//! write and keeps the per-key snapshot set bounded.
//!
//! ## Retention
//! Snapshot writes go through the [`CapacityManager`], so a full medium is
//! reclaimed once before the write is given up. Retention is enforced right
//! after each snapshot attempt, whether or not the write landed:
//! - at most `max_snapshots_per_key` most recent snapshots survive
//! - any snapshot older than `max_age` is purged regardless of count
//!
//! [`BackupManager::purge_expired`] applies the age rule across every key in
//! the namespace and also deletes snapshot records that no longer parse.

mod snapshot;

pub use snapshot::{checksum, Snapshot, SnapshotInfo};

use serde_json::Value;

use crate::capacity::CapacityManager;
use crate::config::RetentionPolicy;
use crate::error::Result;
use crate::keyspace::Keyspace;
use crate::medium::{entry_cost, Medium};

/// Outcome of a space reclamation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub snapshots_removed: usize,
    pub bytes_freed: usize,
}

impl CleanupReport {
    fn record(&mut self, key: &str, raw: Option<&str>) {
        self.snapshots_removed += 1;
        self.bytes_freed += raw.map(|v| entry_cost(key, v)).unwrap_or(0);
    }
}

/// Creates, lists and prunes snapshots
#[derive(Debug, Clone)]
pub struct BackupManager {
    keyspace: Keyspace,
    retention: RetentionPolicy,
}

impl BackupManager {
    pub fn new(keyspace: Keyspace, retention: RetentionPolicy) -> Self {
        Self {
            keyspace,
            retention,
        }
    }

    /// Persist a snapshot of `value` for `key`, then enforce retention
    ///
    /// Returns the snapshot's timestamp, which is `now` unless an existing
    /// snapshot already holds that instant.
    pub fn snapshot(
        &self,
        medium: &mut dyn Medium,
        capacity: &CapacityManager,
        key: &str,
        value: &Value,
        now: u64,
    ) -> Result<u64> {
        let timestamp = match self.timestamps(medium, key).first() {
            Some(&newest) if newest >= now => newest + 1,
            _ => now,
        };

        let snapshot = Snapshot::new(key, value.clone(), timestamp)?;
        let physical = self.keyspace.snapshot_key(key, timestamp);
        let written = capacity.write(medium, &physical, &snapshot.encode()?, now);

        let pruned = self.enforce_retention(medium, key, now)?;
        written?;
        tracing::debug!(
            key = %key,
            timestamp,
            pruned = pruned.snapshots_removed,
            "snapshot taken"
        );
        Ok(timestamp)
    }

    /// Snapshot timestamps for `key`, newest first
    pub fn timestamps(&self, medium: &dyn Medium, key: &str) -> Vec<u64> {
        // The prefix of `a` also covers snapshots of `a__b`; keep exact matches
        let mut timestamps: Vec<u64> = medium
            .keys(&self.keyspace.snapshot_prefix(key))
            .iter()
            .filter_map(|physical| self.keyspace.parse_snapshot_key(physical))
            .filter(|(logical, _)| logical == key)
            .map(|(_, ts)| ts)
            .collect();
        timestamps.sort_unstable_by(|a, b| b.cmp(a));
        timestamps
    }

    /// Load one snapshot, `None` if absent or unparsable
    pub fn load(&self, medium: &dyn Medium, key: &str, timestamp: u64) -> Result<Option<Snapshot>> {
        let Some(raw) = medium.read(&self.keyspace.snapshot_key(key, timestamp))? else {
            return Ok(None);
        };
        match Snapshot::decode(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(key = %key, timestamp, error = %e, "unparsable snapshot");
                Ok(None)
            }
        }
    }

    /// Newest snapshot of `key` whose checksum validates
    ///
    /// Corrupt snapshots are skipped, and so is a snapshot whose recorded
    /// key disagrees with the key it is stored under.
    pub fn newest_valid(&self, medium: &dyn Medium, key: &str) -> Result<Option<Snapshot>> {
        for timestamp in self.timestamps(medium, key) {
            let Some(snapshot) = self.load(medium, key, timestamp)? else {
                continue;
            };
            if snapshot.original_key == key && snapshot.is_valid() {
                return Ok(Some(snapshot));
            }
            tracing::warn!(key = %key, timestamp, "corrupt snapshot skipped");
        }
        Ok(None)
    }

    /// Describe every snapshot of `key`, newest first
    pub fn list(&self, medium: &dyn Medium, key: &str) -> Result<Vec<SnapshotInfo>> {
        let mut infos = Vec::new();
        for timestamp in self.timestamps(medium, key) {
            let Some(raw) = medium.read(&self.keyspace.snapshot_key(key, timestamp))? else {
                continue;
            };
            let valid = Snapshot::decode(&raw)
                .map(|s| s.original_key == key && s.is_valid())
                .unwrap_or(false);
            infos.push(SnapshotInfo {
                timestamp,
                size_bytes: raw.len(),
                valid,
            });
        }
        Ok(infos)
    }

    /// Apply count and age retention to the snapshots of `key`
    pub fn enforce_retention(
        &self,
        medium: &mut dyn Medium,
        key: &str,
        now: u64,
    ) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        for (rank, timestamp) in self.timestamps(medium, key).into_iter().enumerate() {
            if rank >= self.retention.max_snapshots_per_key || self.expired(timestamp, now) {
                let physical = self.keyspace.snapshot_key(key, timestamp);
                let raw = medium.read(&physical)?;
                if medium.delete(&physical)? {
                    report.record(&physical, raw.as_deref());
                }
            }
        }
        Ok(report)
    }

    /// Age-based purge across every key in the namespace
    ///
    /// Snapshot records whose key or body cannot be parsed are unusable for
    /// recovery and are removed as well.
    pub fn purge_expired(&self, medium: &mut dyn Medium, now: u64) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        for physical in medium.keys(&self.keyspace.all_snapshots_prefix()) {
            let raw = medium.read(&physical)?;
            let timestamp = match (self.keyspace.parse_snapshot_key(&physical), raw.as_deref()) {
                (Some(_), Some(body)) => Snapshot::decode(body).ok().map(|s| s.timestamp),
                _ => None,
            };

            let purge = match timestamp {
                Some(ts) => self.expired(ts, now),
                None => true,
            };
            if purge && medium.delete(&physical)? {
                report.record(&physical, raw.as_deref());
            }
        }

        if report.snapshots_removed > 0 {
            tracing::info!(
                removed = report.snapshots_removed,
                bytes_freed = report.bytes_freed,
                "purged expired snapshots"
            );
        }
        Ok(report)
    }

    /// Number of snapshot records in the namespace
    pub fn count(&self, medium: &dyn Medium) -> usize {
        medium.keys(&self.keyspace.all_snapshots_prefix()).len()
    }

    fn expired(&self, timestamp: u64, now: u64) -> bool {
        now.saturating_sub(timestamp) > self.retention.max_age_ms()
    }
}
