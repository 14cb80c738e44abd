//! Tests for statistics, cleanup and registry maintenance

use durastore::medium::Medium;
use durastore::store::{format_bytes, HealthStatus};
use durastore::{Config, GetOptions, SetOptions, Store};
use serde_json::json;

use super::{harness, harness_with, DAY, PREFIX, T0};

// =============================================================================
// Statistics
// =============================================================================

#[test]
fn test_format_bytes() {
    assert_eq!(format_bytes(0), "0 Bytes");
    assert_eq!(format_bytes(512), "512 Bytes");
    assert_eq!(format_bytes(1024), "1 KB");
    assert_eq!(format_bytes(1536), "1.5 KB");
    assert_eq!(format_bytes(1126), "1.1 KB");
    assert_eq!(format_bytes(2 * 1024 * 1024), "2 MB");
}

#[test]
fn test_stats_counts() {
    let h = harness();
    h.store.set("a", &1, SetOptions::default()).unwrap();
    h.store.set("b", &"xy", SetOptions::default()).unwrap();

    let stats = h.store.stats().unwrap();

    assert_eq!(stats.item_count, 2);
    assert_eq!(stats.total_size, 1 + 4);
    assert_eq!(stats.per_key["b"].size_bytes, 4);
    assert_eq!(stats.snapshot_count, 2);
    assert_eq!(stats.used_bytes, h.medium.bytes_under(PREFIX));
    assert_eq!(stats.capacity_bytes, 64 * 1024);
    assert_eq!(stats.formatted_size, format_bytes(stats.used_bytes));
    assert_eq!(stats.health.status, HealthStatus::Healthy);
    assert!(!stats.secondary_available);
    assert_eq!(stats.last_cleanup, None);
}

#[test]
fn test_stats_ignore_foreign_keys() {
    let h = harness();
    let mut medium = h.medium.clone();
    medium.write("someone_else", &"z".repeat(1000)).unwrap();

    let stats = h.store.stats().unwrap();

    assert_eq!(stats.used_bytes, 0);
    assert_eq!(stats.formatted_size, "0 Bytes");
}

#[test]
fn test_health_thresholds() {
    let h = harness();
    assert_eq!(h.store.stats().unwrap().health.status, HealthStatus::Healthy);

    let config = Config::builder().health_thresholds(0.01, 99.0).build();
    let h = harness_with(config, 64 * 1024, None);
    h.store.set("k", &"value", SetOptions::default()).unwrap();
    assert_eq!(h.store.stats().unwrap().health.status, HealthStatus::Warning);

    let config = Config::builder().health_thresholds(0.001, 0.01).build();
    let h = harness_with(config, 64 * 1024, None);
    h.store.set("k", &"value", SetOptions::default()).unwrap();
    let health = h.store.stats().unwrap().health;
    assert_eq!(health.status, HealthStatus::Critical);
    assert!(health.usage_percent > 0.0);
}

#[test]
fn test_stats_serialize_camel_case() {
    let h = harness();
    h.store.set("a", &1, SetOptions::default()).unwrap();

    let stats = serde_json::to_value(h.store.stats().unwrap()).unwrap();

    assert_eq!(stats["itemCount"], 1);
    assert_eq!(stats["perKey"]["a"]["version"], 1);
    assert_eq!(stats["health"]["status"], "healthy");
    assert_eq!(stats["secondaryAvailable"], false);
}

// =============================================================================
// Cleanup
// =============================================================================

#[test]
fn test_cleanup_purges_expired_and_unreadable() {
    let h = harness();
    h.store.set("old", &1, SetOptions::default()).unwrap();
    h.clock.advance(DAY * 31);
    h.store.set("fresh", &2, SetOptions::default()).unwrap();
    let mut medium = h.medium.clone();
    let garbage = h.store.keyspace().snapshot_key("fresh", T0 + 1);
    medium.write(&garbage, "not a snapshot").unwrap();

    let report = h.store.cleanup().unwrap();

    assert_eq!(report.snapshots_removed, 2);
    assert!(report.bytes_freed > 0);
    assert!(h.store.snapshots("old").unwrap().is_empty());
    assert_eq!(h.store.snapshots("fresh").unwrap().len(), 1);
    assert!(h.medium.read(&garbage).unwrap().is_none());

    let now = T0 + (DAY * 31).as_millis() as u64;
    assert_eq!(h.store.stats().unwrap().last_cleanup, Some(now));
}

#[test]
fn test_cleanup_keeps_records() {
    let h = harness();
    h.store.set("k", &json!({"keep": true}), SetOptions::default()).unwrap();
    h.clock.advance(DAY * 60);

    h.store.cleanup().unwrap();

    assert_eq!(
        h.store.get("k", GetOptions::default()).unwrap(),
        Some(json!({"keep": true}))
    );
}

// =============================================================================
// Registry Maintenance
// =============================================================================

#[test]
fn test_reload_sees_writes_from_another_store() {
    let h = harness();
    let other = Store::builder().medium(h.medium.clone()).init().unwrap();

    other.set("shared", &1, SetOptions::default()).unwrap();
    assert!(h.store.keys().is_empty());

    h.store.reload().unwrap();
    assert_eq!(h.store.keys(), vec!["shared"]);
    assert_eq!(h.store.metadata("shared").unwrap().unwrap().version, 1);
}

#[test]
fn test_unreadable_registry_rebuilt_from_records() {
    let h = harness();
    h.store.set("a", &1, SetOptions::default()).unwrap();
    h.store.set("a", &2, SetOptions::default()).unwrap();
    h.store.set("b", &"bee", SetOptions::default()).unwrap();
    let mut medium = h.medium.clone();
    medium
        .write(&h.store.keyspace().metadata_key(), "{{{{")
        .unwrap();

    let rebuilt = Store::builder().medium(h.medium.clone()).init().unwrap();

    assert_eq!(rebuilt.keys(), vec!["a", "b"]);
    let meta = rebuilt.metadata("b").unwrap().unwrap();
    assert_eq!(meta.version, 1);
    assert_eq!(meta.size_bytes, 5);
}

#[test]
fn test_rebuilt_versions_keep_growing() {
    let h = harness();
    for i in 0..3 {
        h.store.set("a", &i, SetOptions::default()).unwrap();
    }
    h.store.set("quiet", &1, SetOptions::without_backup()).unwrap();
    let mut medium = h.medium.clone();
    medium
        .write(&h.store.keyspace().metadata_key(), "not json")
        .unwrap();

    let rebuilt = Store::builder().medium(h.medium.clone()).init().unwrap();

    // Seeded from the snapshot count, never below 1
    assert_eq!(rebuilt.metadata("a").unwrap().unwrap().version, 3);
    assert_eq!(rebuilt.metadata("quiet").unwrap().unwrap().version, 1);

    rebuilt.set("a", &3, SetOptions::default()).unwrap();
    assert_eq!(rebuilt.metadata("a").unwrap().unwrap().version, 4);
}

#[test]
fn test_metadata_record_layout() {
    let h = harness();
    h.store.set("k", &"v", SetOptions::default()).unwrap();

    let raw = h
        .medium
        .read(&format!("{}__metadata__", PREFIX))
        .unwrap()
        .unwrap();
    let record: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(record["entries"]["k"]["sizeBytes"], 3);
    assert_eq!(record["entries"]["k"]["lastUpdated"], T0);
    assert_eq!(record["entries"]["k"]["version"], 1);
}
