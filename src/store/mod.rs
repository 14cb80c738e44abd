//! Store Facade
//!
//! The public entry point. Every operation scopes its key once, at the top,
//! and everything below works on logical keys.
//!
//! ## Write Path
//! ```text
//! set(key, value)
//!   │
//!   ├─▶ scope + validate
//!   ├─▶ CapacityManager::write ──(full after cleanup)──▶ SecondaryStore::put
//!   ├─▶ MetadataRegistry (version + 1, persisted; record rolled back on failure)
//!   ├─▶ BackupManager::snapshot (best-effort)
//!   └─▶ ChangeBus::publish(Written)
//! ```
//!
//! ## Read Path
//! ```text
//! get(key) ─▶ primary ──(parse/validate fails)──▶ recovery ─▶ restored value
//!               │
//!               └──(absent)──▶ secondary
//! ```
//!
//! Mutations hold the state lock for their whole duration; change events
//! are published after it is released.

mod context;
mod options;
mod stats;

pub use context::Context;
pub use options::{Fetched, GetOptions, SetOptions, Source};
pub use stats::{format_bytes, Health, HealthStatus, StoreStats};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::backup::{BackupManager, CleanupReport, SnapshotInfo};
use crate::capacity::CapacityManager;
use crate::config::Config;
use crate::error::{DuraError, Result};
use crate::keyspace::Keyspace;
use crate::medium::{JournalMedium, Medium, MemoryMedium};
use crate::notify::{ChangeBus, ChangeEvent, EventKind, Subscription};
use crate::recovery;
use crate::registry::{MetadataEntry, MetadataRegistry, Tier};
use crate::schema::{Schema, SchemaRegistry};
use crate::secondary::{SecondaryStore, SqliteBackend};

/// File name of the SQLite overflow database inside `data_dir`
pub const SECONDARY_FILENAME: &str = "secondary.db";

/// Mutable state guarded by the store lock
pub(crate) struct State {
    pub(crate) medium: Box<dyn Medium>,
    pub(crate) registry: MetadataRegistry,
}

/// Durable, versioned, self-healing key/value store
pub struct Store {
    pub(crate) config: Config,
    pub(crate) keyspace: Keyspace,
    schemas: SchemaRegistry,
    backups: BackupManager,
    capacity: CapacityManager,
    pub(crate) secondary: SecondaryStore,
    context: Context,
    pub(crate) state: Mutex<State>,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Journal-backed store in `config.data_dir`
    ///
    /// Attaches a SQLite overflow store when `secondary_enabled`; if it cannot
    /// be opened the store runs without one and reports it in [`Store::stats`].
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with(config, Context::new())
    }

    /// Like [`Store::open`], sharing `context`
    pub fn open_with(config: Config, context: Context) -> Result<Self> {
        let medium = JournalMedium::open(&config.data_dir, config.capacity_bytes, config.sync_strategy)?
            .with_compaction_min_bytes(config.compaction_min_bytes);

        let secondary = if config.secondary_enabled {
            let path = config.data_dir.join(SECONDARY_FILENAME);
            match SqliteBackend::open(&path)
                .and_then(|backend| SecondaryStore::spawn(backend, config.secondary_timeout))
            {
                Ok(secondary) => secondary,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "secondary store unavailable");
                    SecondaryStore::disabled()
                }
            }
        } else {
            SecondaryStore::disabled()
        };

        Store::builder()
            .config(config)
            .context(context)
            .medium(medium)
            .secondary(secondary)
            .standard_schemas()
            .init()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn bus(&self) -> &ChangeBus {
        self.context.bus()
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Subscribe to this store's change events
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.context.bus().subscribe(kind, handler)
    }

    pub(crate) fn now(&self) -> u64 {
        self.context.now_millis()
    }

    pub(crate) fn publish(&self, event: ChangeEvent) {
        self.context.bus().publish(&event);
    }

    // =========================================================================
    // Core Operations
    // =========================================================================

    /// Store `value` under `key`
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, opts: SetOptions) -> Result<()> {
        let key = self.keyspace.scope(key)?;
        let value = serde_json::to_value(value)?;
        self.set_scoped(&key, value, opts)
    }

    pub(crate) fn set_scoped(&self, key: &str, value: Value, opts: SetOptions) -> Result<()> {
        if opts.validate {
            self.validate(key, &value)?;
        }

        let now = self.now();
        let tier = {
            let mut guard = self.state.lock();
            let State { medium, registry } = &mut *guard;
            self.commit(&mut **medium, registry, key, &value, opts.backup, now)?
        };

        tracing::debug!(key = %key, ?tier, "write committed");
        self.publish(ChangeEvent::Written {
            key: key.to_string(),
            value,
            timestamp: now,
        });
        Ok(())
    }

    /// Read `key`, returning `opts.fallback` when it is absent or unrecoverable
    pub fn get(&self, key: &str, opts: GetOptions) -> Result<Option<Value>> {
        match self.fetch(key, opts.validate) {
            Ok(Some(fetched)) => Ok(Some(fetched.value)),
            Ok(None) => Ok(opts.fallback),
            Err(e @ DuraError::InvalidKey(_)) => Err(e),
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "read failed, using fallback");
                Ok(opts.fallback)
            }
        }
    }

    /// Read `key` along with where the value came from
    ///
    /// A primary record that fails to parse or validate is recovered from its
    /// newest valid snapshot; with none, `CorruptionUnrecoverable` is returned
    /// and the record is left as it is.
    pub fn fetch(&self, key: &str, validate: bool) -> Result<Option<Fetched>> {
        let key = self.keyspace.scope(key)?;
        self.fetch_scoped(&key, validate)
    }

    pub(crate) fn fetch_scoped(&self, key: &str, validate: bool) -> Result<Option<Fetched>> {
        let mut guard = self.state.lock();
        let State { medium, registry } = &mut *guard;

        if let Some(raw) = medium.read(&self.keyspace.record_key(key))? {
            return match self.decode(key, &raw, validate) {
                Ok(value) => Ok(Some(Fetched {
                    value,
                    source: Source::Primary,
                })),
                Err(reason) => {
                    let now = self.now();
                    let recovered = recovery::recover(
                        &self.backups,
                        &mut **medium,
                        key,
                        &reason,
                        |medium, value| {
                            self.commit(medium, registry, key, value, false, now).map(|_| ())
                        },
                    )?;
                    Ok(Some(Fetched {
                        value: recovered.value,
                        source: Source::Recovered {
                            snapshot_timestamp: recovered.snapshot_timestamp,
                        },
                    }))
                }
            };
        }

        let tracked_secondary = registry.get(key).is_some_and(|e| e.tier == Tier::Secondary);
        drop(guard);

        if !self.secondary.is_available() {
            return Ok(None);
        }

        let raw = match self.secondary.get(key).wait() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(e) if tracked_secondary => return Err(e),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "secondary lookup failed");
                return Ok(None);
            }
        };

        match self.decode(key, &raw, validate) {
            Ok(value) => Ok(Some(Fetched {
                value,
                source: Source::Secondary,
            })),
            Err(reason) => {
                tracing::warn!(key = %key, reason = %reason, "secondary record failed validation");
                Err(DuraError::CorruptionUnrecoverable(key.to_string()))
            }
        }
    }

    /// Delete `key` and its metadata; snapshots are kept
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let key = self.keyspace.scope(key)?;
        let now = self.now();

        let removed = {
            let mut guard = self.state.lock();
            let State { medium, registry } = &mut *guard;

            let in_primary = medium.delete(&self.keyspace.record_key(&key))?;
            let entry = registry.remove(&key);
            if entry.is_some() {
                self.persist_registry(&mut **medium, registry, now)?;
            }

            let in_secondary = self.secondary.is_available()
                && match self.secondary.delete(&key).wait() {
                    Ok(existed) => existed,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "secondary delete failed");
                        false
                    }
                };

            in_primary || in_secondary || entry.is_some()
        };

        if removed {
            tracing::debug!(key = %key, "removed");
            self.publish(ChangeEvent::Removed {
                key,
                timestamp: now,
            });
        }
        Ok(removed)
    }

    /// Remove every key in the namespace: records, snapshots and metadata
    ///
    /// Returns the number of primary records deleted.
    pub fn clear_all(&self) -> Result<usize> {
        let now = self.now();
        let removed = {
            let mut guard = self.state.lock();
            self.clear_locked(&mut guard)?
        };

        tracing::info!(removed, "namespace cleared");
        self.publish(ChangeEvent::Cleared { timestamp: now });
        Ok(removed)
    }

    pub(crate) fn clear_locked(&self, state: &mut State) -> Result<usize> {
        let mut removed = 0;
        for physical in state.medium.keys(self.keyspace.prefix()) {
            if state.medium.delete(&physical)? {
                removed += 1;
            }
        }
        state.registry.clear();

        if self.secondary.is_available() {
            if let Err(e) = self.secondary.clear().wait() {
                tracing::warn!(error = %e, "secondary clear failed");
            }
        }
        Ok(removed)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Purge expired and unreadable snapshots across the namespace
    pub fn cleanup(&self) -> Result<CleanupReport> {
        let now = self.now();
        let mut guard = self.state.lock();
        let State { medium, registry } = &mut *guard;

        let report = self.backups.purge_expired(&mut **medium, now)?;
        registry.set_last_cleanup(now);
        self.persist_registry(&mut **medium, registry, now)?;

        tracing::info!(
            removed = report.snapshots_removed,
            bytes_freed = report.bytes_freed,
            "cleanup finished"
        );
        Ok(report)
    }

    /// Snapshots of `key`, newest first
    pub fn snapshots(&self, key: &str) -> Result<Vec<SnapshotInfo>> {
        let key = self.keyspace.scope(key)?;
        let guard = self.state.lock();
        self.backups.list(&*guard.medium, &key)
    }

    /// Metadata of `key`, if it exists
    pub fn metadata(&self, key: &str) -> Result<Option<MetadataEntry>> {
        let key = self.keyspace.scope(key)?;
        Ok(self.state.lock().registry.get(&key).cloned())
    }

    /// Live keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().registry.keys()
    }

    /// Re-read the metadata registry from the medium
    pub fn reload(&self) -> Result<()> {
        let now = self.now();
        let mut guard = self.state.lock();
        let registry = MetadataRegistry::load(&*guard.medium, &self.keyspace, now)?;
        guard.registry = registry;
        tracing::debug!(items = guard.registry.item_count(), "registry reloaded");
        Ok(())
    }

    /// Current statistics and health
    pub fn stats(&self) -> Result<StoreStats> {
        let guard = self.state.lock();
        let medium = &*guard.medium;
        let registry = &guard.registry;

        let used_bytes = medium.bytes_under(self.keyspace.prefix());
        let capacity_bytes = medium.capacity_bytes();
        let usage_percent = CapacityManager::usage_percent(used_bytes, capacity_bytes);
        let total_size = registry.total_size();

        Ok(StoreStats {
            total_size,
            item_count: registry.item_count(),
            per_key: registry.entries().clone(),
            snapshot_count: self.backups.count(medium),
            used_bytes,
            capacity_bytes,
            formatted_size: format_bytes(used_bytes),
            health: Health {
                status: stats::classify(
                    usage_percent,
                    self.config.health.warning_percent,
                    self.config.health.critical_percent,
                ),
                usage_percent,
            },
            secondary_available: self.secondary.is_available(),
            last_cleanup: registry.last_cleanup(),
        })
    }

    /// Flush the medium and stop the secondary worker
    pub fn shutdown(&self) -> Result<()> {
        self.state.lock().medium.sync()?;
        self.secondary.shutdown();
        tracing::debug!("store shut down");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn validate(&self, key: &str, value: &Value) -> Result<()> {
        self.schemas
            .validate(key, value)
            .map_err(|reason| DuraError::ValidationFailed {
                key: key.to_string(),
                reason,
            })
    }

    fn decode(&self, key: &str, raw: &str, validate: bool) -> std::result::Result<Value, String> {
        let value: Value = serde_json::from_str(raw).map_err(|e| format!("unparsable record: {}", e))?;
        if validate {
            self.schemas.validate(key, &value)?;
        }
        Ok(value)
    }

    /// Commit one write: record, metadata, then (optionally) a snapshot
    ///
    /// The registry is only changed once the record is stored, and the record
    /// is rolled back if the registry cannot be persisted. When the primary
    /// has room for the record but not for the grown registry, the write goes
    /// to the secondary store like any other overflow.
    pub(crate) fn commit(
        &self,
        medium: &mut dyn Medium,
        registry: &mut MetadataRegistry,
        key: &str,
        value: &Value,
        backup: bool,
        now: u64,
    ) -> Result<Tier> {
        let text = serde_json::to_string(value)?;
        let physical = self.keyspace.record_key(key);
        let previous = medium.read(&physical)?;

        let mut tier = match self.capacity.write(medium, &physical, &text, now) {
            Ok(()) => Tier::Primary,
            Err(e) if e.is_capacity_exceeded() => {
                self.overflow(medium, key, &physical, &text, now, e)?;
                Tier::Secondary
            }
            Err(e) => return Err(e),
        };

        let entry = registry.next_entry(key, text.len(), now, tier);
        let mut displaced = registry.insert(key, entry);

        if let Err(e) = self.persist_registry(medium, registry, now) {
            if tier == Tier::Secondary {
                tracing::warn!(key = %key, error = %e, "metadata not persisted after overflow");
            } else {
                registry.restore(key, displaced);
                self.roll_back(medium, key, &physical, previous.as_deref());
                if !e.is_capacity_exceeded() {
                    return Err(e);
                }

                // The record fit but the metadata growth did not
                self.overflow(medium, key, &physical, &text, now, e)?;
                tier = Tier::Secondary;
                let entry = registry.next_entry(key, text.len(), now, tier);
                displaced = registry.insert(key, entry);
                if let Err(e) = self.persist_registry(medium, registry, now) {
                    tracing::warn!(key = %key, error = %e, "metadata not persisted after overflow");
                }
            }
        }

        if tier == Tier::Primary && displaced.as_ref().is_some_and(|d| d.tier == Tier::Secondary) {
            if let Err(e) = self.secondary.delete(key).wait() {
                tracing::warn!(key = %key, error = %e, "stale secondary copy not deleted");
            }
        }

        if backup {
            if let Err(e) = self.backups.snapshot(medium, &self.capacity, key, value, now) {
                tracing::warn!(key = %key, error = %e, "snapshot not taken");
            }
        }
        Ok(tier)
    }

    /// Restore the record a failed commit replaced
    fn roll_back(&self, medium: &mut dyn Medium, key: &str, physical: &str, previous: Option<&str>) {
        let rollback = match previous {
            Some(old) => medium.write(physical, old),
            None => medium.delete(physical).map(|_| ()),
        };
        if let Err(e) = rollback {
            tracing::warn!(key = %key, error = %e, "record rollback failed");
        }
    }

    /// Place a write the primary cannot hold on the secondary store
    fn overflow(
        &self,
        medium: &mut dyn Medium,
        key: &str,
        physical: &str,
        text: &str,
        now: u64,
        cause: DuraError,
    ) -> Result<()> {
        if !self.secondary.is_available() {
            return Err(cause);
        }

        self.secondary
            .put(key, text, now)
            .wait()
            .map_err(|e| match e {
                DuraError::SecondaryStoreUnavailable(_) => e,
                other => DuraError::SecondaryStoreUnavailable(other.to_string()),
            })?;

        // The primary may still hold an older value for this key
        if let Err(e) = medium.delete(physical) {
            tracing::warn!(key = %key, error = %e, "stale primary copy not deleted");
        }

        tracing::info!(key = %key, bytes = text.len(), "write overflowed to secondary store");
        Ok(())
    }

    pub(crate) fn persist_registry(
        &self,
        medium: &mut dyn Medium,
        registry: &MetadataRegistry,
        now: u64,
    ) -> Result<()> {
        self.capacity
            .write(medium, registry.key(), &registry.encode()?, now)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("prefix", &self.keyspace.prefix())
            .field("secondary_available", &self.secondary.is_available())
            .finish()
    }
}

/// Builder for [`Store`]
///
/// Defaults: `Config::default()`, a fresh [`Context`], an in-memory medium of
/// `config.capacity_bytes`, no secondary store, no schemas.
#[derive(Default)]
pub struct StoreBuilder {
    config: Option<Config>,
    context: Option<Context>,
    medium: Option<Box<dyn Medium>>,
    secondary: Option<SecondaryStore>,
    schemas: SchemaRegistry,
}

impl StoreBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn medium<M: Medium + 'static>(mut self, medium: M) -> Self {
        self.medium = Some(Box::new(medium));
        self
    }

    pub fn secondary(mut self, secondary: SecondaryStore) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Declare the schema of one exact key
    pub fn schema(mut self, key: impl Into<String>, schema: Schema) -> Self {
        self.schemas.register(key, schema);
        self
    }

    /// Declare the schema of a key family (`name` and `name_*`)
    pub fn family(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.schemas.register_family(name, schema);
        self
    }

    /// The `user`, `requests` and `vehicles` families
    pub fn standard_schemas(self) -> Self {
        self.family("user", Schema::user())
            .family("requests", Schema::requests())
            .family("vehicles", Schema::vehicles())
    }

    /// Load the metadata registry and assemble the store
    pub fn init(self) -> Result<Store> {
        let config = self.config.unwrap_or_default();
        if config.namespace_prefix.is_empty() {
            return Err(DuraError::Config("namespace prefix must not be empty".to_string()));
        }
        if config.retention.max_snapshots_per_key == 0 {
            return Err(DuraError::Config(
                "max_snapshots_per_key must be at least 1".to_string(),
            ));
        }

        let context = self.context.unwrap_or_default();
        let medium = self
            .medium
            .unwrap_or_else(|| Box::new(MemoryMedium::new(config.capacity_bytes)));
        let secondary = self.secondary.unwrap_or_else(SecondaryStore::disabled);

        let keyspace = Keyspace::new(config.namespace_prefix.clone());
        let backups = BackupManager::new(keyspace.clone(), config.retention);
        let capacity = CapacityManager::new(backups.clone());
        let registry = MetadataRegistry::load(&*medium, &keyspace, context.now_millis())?;

        tracing::info!(
            prefix = %keyspace.prefix(),
            items = registry.item_count(),
            secondary = secondary.is_available(),
            "store initialized"
        );

        Ok(Store {
            config,
            keyspace,
            schemas: self.schemas,
            backups,
            capacity,
            secondary,
            context,
            state: Mutex::new(State { medium, registry }),
        })
    }
}
