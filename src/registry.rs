//! Metadata Registry
//!
//! One physical record, under the namespace's metadata key, mapping every
//! live key to its `{sizeBytes, lastUpdated, version}`. The store keeps the
//! decoded registry in memory and rewrites the record after each change.
//!
//! The registry is consulted for statistics and key listing only; reads never
//! depend on it for correctness.
//!
//! ## Rebuild
//! An unreadable registry record is rebuilt from the records present. Each
//! key's version is seeded from the number of its snapshots, a lower bound
//! on the writes it has seen. When more writes than surviving snapshots
//! happened, the rebuilt version is lower than the lost one; it only grows
//! from there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keyspace::Keyspace;
use crate::medium::Medium;

/// Which store holds the committed value of a key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Primary,
    Secondary,
}

/// Per-key metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    /// Serialized size of the last committed value
    pub size_bytes: usize,

    /// Unix millis of the last committed write
    pub last_updated: u64,

    /// Incremented on every committed write, never decreases
    pub version: u64,

    #[serde(default)]
    pub tier: Tier,
}

/// On-medium shape of the registry record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryRecord {
    #[serde(default)]
    entries: BTreeMap<String, MetadataEntry>,

    #[serde(default)]
    last_cleanup: Option<u64>,
}

/// In-memory view of the metadata record
#[derive(Debug, Clone)]
pub struct MetadataRegistry {
    key: String,
    record: RegistryRecord,
}

impl MetadataRegistry {
    /// Load the registry from the medium
    ///
    /// A missing record yields an empty registry. An unreadable one is
    /// rebuilt from the records actually present.
    pub fn load(medium: &dyn Medium, keyspace: &Keyspace, now: u64) -> Result<Self> {
        let key = keyspace.metadata_key();

        let record = match medium.read(&key)? {
            None => RegistryRecord::default(),
            Some(raw) => match serde_json::from_str::<RegistryRecord>(&raw) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "metadata registry unreadable, rebuilding");
                    Self::rebuild(medium, keyspace, now)?
                }
            },
        };

        Ok(Self { key, record })
    }

    fn rebuild(medium: &dyn Medium, keyspace: &Keyspace, now: u64) -> Result<RegistryRecord> {
        let mut snapshots: BTreeMap<String, u64> = BTreeMap::new();
        for physical in medium.keys(&keyspace.all_snapshots_prefix()) {
            if let Some((logical, _)) = keyspace.parse_snapshot_key(&physical) {
                *snapshots.entry(logical).or_default() += 1;
            }
        }

        let mut entries = BTreeMap::new();
        for physical in medium.keys(keyspace.prefix()) {
            let Some(logical) = keyspace.logical_of_record(&physical) else {
                continue;
            };
            if let Some(raw) = medium.read(&physical)? {
                let version = snapshots.get(&logical).copied().unwrap_or(0).max(1);
                entries.insert(
                    logical,
                    MetadataEntry {
                        size_bytes: raw.len(),
                        last_updated: now,
                        version,
                        tier: Tier::Primary,
                    },
                );
            }
        }
        Ok(RegistryRecord {
            entries,
            last_cleanup: None,
        })
    }

    /// Physical key of the registry record
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialized registry record
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.record)?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, key: &str) -> Option<&MetadataEntry> {
        self.record.entries.get(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, MetadataEntry> {
        &self.record.entries
    }

    /// Live keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.record.entries.keys().cloned().collect()
    }

    pub fn item_count(&self) -> usize {
        self.record.entries.len()
    }

    /// Sum of the committed value sizes
    pub fn total_size(&self) -> usize {
        self.record.entries.values().map(|e| e.size_bytes).sum()
    }

    pub fn last_updated(&self, key: &str) -> Option<u64> {
        self.get(key).map(|e| e.last_updated)
    }

    pub fn last_cleanup(&self) -> Option<u64> {
        self.record.last_cleanup
    }

    /// Entry describing a write of `size_bytes` to `key` at `now`
    pub fn next_entry(&self, key: &str, size_bytes: usize, now: u64, tier: Tier) -> MetadataEntry {
        MetadataEntry {
            size_bytes,
            last_updated: now,
            version: self.get(key).map(|e| e.version).unwrap_or(0) + 1,
            tier,
        }
    }

    // =========================================================================
    // Mutations (in memory; the caller persists `encode()`)
    // =========================================================================

    pub fn insert(&mut self, key: &str, entry: MetadataEntry) -> Option<MetadataEntry> {
        self.record.entries.insert(key.to_string(), entry)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataEntry> {
        self.record.entries.remove(key)
    }

    /// Put back what `insert`/`remove` displaced
    pub fn restore(&mut self, key: &str, previous: Option<MetadataEntry>) {
        match previous {
            Some(entry) => {
                self.record.entries.insert(key.to_string(), entry);
            }
            None => {
                self.record.entries.remove(key);
            }
        }
    }

    pub fn clear(&mut self) {
        self.record = RegistryRecord::default();
    }

    pub fn set_last_cleanup(&mut self, at: u64) {
        self.record.last_cleanup = Some(at);
    }
}
