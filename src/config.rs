//! Configuration for durastore
//!
//! Centralized configuration with sensible defaults. The retention and
//! capacity numbers are defaults, not load-bearing constants.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a durastore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for on-disk media
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── primary.journal   (primary medium)
    ///     └── secondary.db      (overflow store)
    pub data_dir: PathBuf,

    /// Reserved prefix every in-scope physical key carries
    pub namespace_prefix: String,

    /// Primary medium capacity (in bytes)
    pub capacity_bytes: usize,

    /// Sync strategy for the journal medium
    pub sync_strategy: SyncStrategy,

    /// Journal size that always triggers compaction once exceeded
    pub compaction_min_bytes: u64,

    // -------------------------------------------------------------------------
    // Snapshot Configuration
    // -------------------------------------------------------------------------
    /// Snapshot retention (count and age)
    pub retention: RetentionPolicy,

    // -------------------------------------------------------------------------
    // Secondary Store Configuration
    // -------------------------------------------------------------------------
    /// Whether `Store::open` attaches the SQLite overflow store
    pub secondary_enabled: bool,

    /// How long a caller waits on the secondary store before giving up
    pub secondary_timeout: Duration,

    // -------------------------------------------------------------------------
    // Export Configuration
    // -------------------------------------------------------------------------
    /// Format version stamped on exported bundles
    pub format_version: String,

    /// Bundle versions accepted by import
    pub supported_formats: Vec<String>,

    // -------------------------------------------------------------------------
    // Health Reporting
    // -------------------------------------------------------------------------
    pub health: HealthThresholds,
}

/// Journal sync strategy
#[derive(Debug, Clone, Copy)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Per-key snapshot retention
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Keep at most this many snapshots per key
    pub max_snapshots_per_key: usize,

    /// Purge snapshots older than this regardless of count
    pub max_age: Duration,
}

impl RetentionPolicy {
    /// Age limit in milliseconds
    pub fn max_age_ms(&self) -> u64 {
        self.max_age.as_millis() as u64
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_snapshots_per_key: 5,
            max_age: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
        }
    }
}

/// Usage percentages at which health degrades
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub warning_percent: f64,
    pub critical_percent: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 50.0,
            critical_percent: 80.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./durastore_data"),
            namespace_prefix: "autocare_v1_".to_string(),
            capacity_bytes: 5 * 1024 * 1024, // 5 MB
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            compaction_min_bytes: 256 * 1024,
            retention: RetentionPolicy::default(),
            secondary_enabled: true,
            secondary_timeout: Duration::from_secs(2),
            format_version: "1.0".to_string(),
            supported_formats: vec!["1.0".to_string()],
            health: HealthThresholds::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all on-disk media)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the namespace prefix
    pub fn namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.namespace_prefix = prefix.into();
        self
    }

    /// Set the primary capacity (in bytes)
    pub fn capacity_bytes(mut self, bytes: usize) -> Self {
        self.config.capacity_bytes = bytes;
        self
    }

    /// Set the journal sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the journal compaction threshold (in bytes)
    pub fn compaction_min_bytes(mut self, bytes: u64) -> Self {
        self.config.compaction_min_bytes = bytes;
        self
    }

    /// Set how many snapshots are kept per key
    pub fn max_snapshots_per_key(mut self, count: usize) -> Self {
        self.config.retention.max_snapshots_per_key = count;
        self
    }

    /// Set the maximum snapshot age
    pub fn max_snapshot_age(mut self, age: Duration) -> Self {
        self.config.retention.max_age = age;
        self
    }

    /// Enable or disable the secondary store in `Store::open`
    pub fn secondary_enabled(mut self, enabled: bool) -> Self {
        self.config.secondary_enabled = enabled;
        self
    }

    /// Set the secondary store timeout
    pub fn secondary_timeout(mut self, timeout: Duration) -> Self {
        self.config.secondary_timeout = timeout;
        self
    }

    /// Set the export format version
    pub fn format_version(mut self, version: impl Into<String>) -> Self {
        self.config.format_version = version.into();
        self
    }

    /// Set the import-accepted format versions
    pub fn supported_formats<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.supported_formats = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the health thresholds (percent of capacity)
    pub fn health_thresholds(mut self, warning_percent: f64, critical_percent: f64) -> Self {
        self.config.health = HealthThresholds {
            warning_percent,
            critical_percent,
        };
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
