//! Statistics and health reporting

use std::collections::BTreeMap;

use serde::Serialize;

use crate::registry::MetadataEntry;

/// Coarse health classification by namespace usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: HealthStatus,

    /// Namespace bytes as a percentage of primary capacity
    pub usage_percent: f64,
}

/// Snapshot of the store's statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Sum of committed value sizes
    pub total_size: usize,
    pub item_count: usize,
    pub per_key: BTreeMap<String, MetadataEntry>,

    pub snapshot_count: usize,

    /// Bytes the namespace occupies on the primary medium (records, snapshots, metadata)
    pub used_bytes: usize,
    pub capacity_bytes: usize,
    pub formatted_size: String,
    pub health: Health,

    /// False when writes can no longer overflow anywhere
    pub secondary_available: bool,
    pub last_cleanup: Option<u64>,
}

/// Human-readable byte count: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut scaled = bytes as f64;
    let mut unit = 0;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    // Two decimals at most, trailing zeros dropped
    let rendered = format!("{:.2}", scaled);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rendered, UNITS[unit])
}

pub(crate) fn classify(usage_percent: f64, warning: f64, critical: f64) -> HealthStatus {
    if usage_percent >= critical {
        HealthStatus::Critical
    } else if usage_percent >= warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}
