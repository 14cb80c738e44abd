//! Bulk Export/Import
//!
//! ## Bundle Format
//! ```text
//! {
//!   "formatVersion": "1.0",
//!   "exportDate":    "2024-06-10T08:00:00Z",
//!   "data":          { "user_1": { ... }, "requests_1": [ ... ] },
//!   "metadata":      { "user_1": { "sizeBytes": 42, "lastUpdated": ..., "version": 3 } }
//! }
//! ```
//!
//! Import fails closed on an unknown `formatVersion`. Every entry is checked
//! before anything is cleared; once the namespace is cleared, a failing write
//! aborts the import and reports the keys already committed.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DuraError, Result};
use crate::notify::ChangeEvent;
use crate::registry::MetadataEntry;
use crate::store::{State, Store};

/// Portable serialization of a whole namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub format_version: String,
    pub export_date: DateTime<Utc>,
    pub data: BTreeMap<String, Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataEntry>,
}

impl ExportBundle {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Store {
    /// Serialize every readable key in the namespace
    ///
    /// Each key is read through the normal read path, so corrupt records are
    /// recovered first. Keys that cannot be read are left out.
    pub fn export_all(&self) -> Result<ExportBundle> {
        let now = self.now();
        let mut data = BTreeMap::new();

        for key in self.keys() {
            match self.fetch_scoped(&key, true) {
                Ok(Some(fetched)) => {
                    data.insert(key, fetched.value);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "key left out of export"),
            }
        }

        let metadata = {
            let guard = self.state.lock();
            data.keys()
                .filter_map(|k| guard.registry.get(k).map(|e| (k.clone(), e.clone())))
                .collect()
        };

        tracing::info!(keys = data.len(), "namespace exported");
        Ok(ExportBundle {
            format_version: self.config.format_version.clone(),
            export_date: DateTime::from_timestamp_millis(now as i64).unwrap_or_default(),
            data,
            metadata,
        })
    }

    /// Replace the namespace with the contents of `bundle`
    ///
    /// Publishes a single `Imported` event listing the written keys.
    pub fn import_all(&self, bundle: &ExportBundle) -> Result<()> {
        if !self
            .config
            .supported_formats
            .iter()
            .any(|v| *v == bundle.format_version)
        {
            return Err(DuraError::ImportFormatMismatch {
                found: bundle.format_version.clone(),
                supported: self.config.supported_formats.clone(),
            });
        }

        let entries = self.check_bundle(bundle)?;
        let now = self.now();

        let outcome = {
            let mut guard = self.state.lock();
            self.clear_locked(&mut guard)?;
            self.write_bundle(&mut guard, bundle, entries, now)
        };

        let committed = match &outcome {
            Ok(keys) => keys.clone(),
            Err(DuraError::ImportPartialFailure { committed, .. }) => committed.clone(),
            Err(_) => Vec::new(),
        };
        self.publish(ChangeEvent::Imported {
            keys: committed,
            timestamp: now,
        });

        let keys = outcome?;
        tracing::info!(keys = keys.len(), format = %bundle.format_version, "bundle imported");
        Ok(())
    }

    /// Scope and validate every entry without touching the medium
    fn check_bundle(&self, bundle: &ExportBundle) -> Result<Vec<(String, Value)>> {
        bundle
            .data
            .iter()
            .map(|(key, value)| {
                let logical = self.keyspace.scope(key)?;
                self.validate(&logical, value)?;
                Ok((logical, value.clone()))
            })
            .collect()
    }

    fn write_bundle(
        &self,
        state: &mut State,
        bundle: &ExportBundle,
        entries: Vec<(String, Value)>,
        now: u64,
    ) -> Result<Vec<String>> {
        let State { medium, registry } = state;
        let mut committed = Vec::with_capacity(entries.len());

        for (key, value) in entries {
            if let Err(e) = self.commit(&mut **medium, registry, &key, &value, false, now) {
                tracing::warn!(key = %key, error = %e, committed = committed.len(), "import aborted");
                return Err(DuraError::ImportPartialFailure {
                    committed,
                    failed_key: key,
                    reason: e.to_string(),
                });
            }
            committed.push(key);
        }

        // Keep the bundle's history; sizes and tiers reflect what was just written
        for key in &committed {
            let Some(imported) = bundle
                .metadata
                .get(key)
                .or_else(|| bundle.metadata.get(&self.keyspace.record_key(key)))
            else {
                continue;
            };
            if let Some(current) = registry.get(key).cloned() {
                registry.insert(
                    key,
                    MetadataEntry {
                        version: imported.version.max(1),
                        last_updated: imported.last_updated,
                        ..current
                    },
                );
            }
        }
        if !bundle.metadata.is_empty() {
            if let Err(e) = self.persist_registry(&mut **medium, registry, now) {
                tracing::warn!(error = %e, "imported metadata not persisted");
            }
        }

        Ok(committed)
    }
}
