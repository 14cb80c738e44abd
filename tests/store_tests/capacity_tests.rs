//! Tests for capacity reclamation and overflow to the secondary store

use std::time::{Duration, Instant};

use durastore::medium::Medium;
use durastore::registry::Tier;
use durastore::secondary::{MemoryBackend, SecondaryStore};
use durastore::{Config, DuraError, GetOptions, SetOptions, Source};
use serde_json::json;

use super::{harness_with, Harness, DAY, PREFIX, T0};

fn with_backend(capacity: usize, timeout: Duration) -> (Harness, MemoryBackend) {
    let backend = MemoryBackend::new();
    let secondary = SecondaryStore::spawn(backend.clone(), timeout).unwrap();
    (harness_with(Config::default(), capacity, Some(secondary)), backend)
}

/// A string value whose record alone is larger than `bytes`
fn oversized(bytes: usize) -> String {
    "x".repeat(bytes + 1)
}

/// Occupy everything but `spare` bytes with a record outside the namespace
fn fill_leaving(h: &Harness, spare: usize) {
    let mut medium = h.medium.clone();
    let free = medium.capacity_bytes() - medium.used_bytes();
    let blob = "z".repeat(free - spare - "blob".len());
    medium.write("blob", &blob).unwrap();
    assert_eq!(medium.capacity_bytes() - medium.used_bytes(), spare);
}

/// A value for `key` whose record leaves exactly `spare` bytes free
fn record_leaving(h: &Harness, key: &str, spare: usize) -> String {
    let free = h.medium.capacity_bytes() - h.medium.used_bytes();
    // Record cost is the physical key plus the quoted JSON string
    "y".repeat(free - spare - h.record(key).len() - 2)
}

// =============================================================================
// Reclaim And Retry
// =============================================================================

#[test]
fn test_expired_snapshots_reclaimed_before_failing() {
    let h = harness_with(Config::default(), 4096, None);
    for i in 0..5 {
        h.store.set("a", &i, SetOptions::default()).unwrap();
    }
    h.clock.advance(DAY * 31);

    let snapshot_bytes = h.medium.bytes_under(&format!("{}__backup__", PREFIX));
    let free = h.medium.capacity_bytes() - h.medium.used_bytes();
    assert!(snapshot_bytes > 300);

    // Too large for the free space, small enough once the snapshots are gone
    let value = "y".repeat(free);
    h.store.set("b", &value, SetOptions::without_backup()).unwrap();

    assert!(h.store.snapshots("a").unwrap().is_empty());
    assert_eq!(h.store.metadata("b").unwrap().unwrap().tier, Tier::Primary);
    assert_eq!(h.store.get("b", GetOptions::default()).unwrap(), Some(json!(value)));
}

#[test]
fn test_capacity_exceeded_without_secondary() {
    let h = harness_with(Config::default(), 1024, None);
    h.store.set("small", &1, SetOptions::default()).unwrap();
    let (events, _sub) = h.record_events();

    let err = h
        .store
        .set("big", &oversized(1024), SetOptions::default())
        .unwrap_err();

    assert!(matches!(err, DuraError::CapacityExceeded { .. }));
    assert!(h.store.metadata("big").unwrap().is_none());
    assert_eq!(h.store.keys(), vec!["small".to_string()]);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_failed_overwrite_keeps_previous_value() {
    let h = harness_with(Config::default(), 1024, None);
    h.store.set("k", &"short", SetOptions::default()).unwrap();

    assert!(h.store.set("k", &oversized(1024), SetOptions::default()).is_err());

    assert_eq!(h.store.get("k", GetOptions::default()).unwrap(), Some(json!("short")));
    assert_eq!(h.store.metadata("k").unwrap().unwrap().version, 1);
}

// =============================================================================
// Metadata And Snapshot Pressure
// =============================================================================

#[test]
fn test_metadata_growth_overflows_to_secondary() {
    let (h, backend) = with_backend(4096, Duration::from_secs(2));
    h.store.set("a", &1, SetOptions::without_backup()).unwrap();

    // The record fits, the registry entry for it does not
    let value = record_leaving(&h, "b", 10);
    h.store.set("b", &value, SetOptions::without_backup()).unwrap();

    assert!(backend.record("b").is_some());
    assert!(h.medium.read(&h.record("b")).unwrap().is_none());
    let meta = h.store.metadata("b").unwrap().unwrap();
    assert_eq!(meta.tier, Tier::Secondary);
    assert_eq!(meta.version, 1);
    assert_eq!(h.store.get("b", GetOptions::default()).unwrap(), Some(json!(value)));
}

#[test]
fn test_metadata_growth_without_secondary_rolls_back() {
    let h = harness_with(Config::default(), 4096, None);
    h.store.set("a", &1, SetOptions::without_backup()).unwrap();

    let value = record_leaving(&h, "b", 10);
    let err = h
        .store
        .set("b", &value, SetOptions::without_backup())
        .unwrap_err();

    assert!(matches!(err, DuraError::CapacityExceeded { .. }));
    assert!(h.medium.read(&h.record("b")).unwrap().is_none());
    assert!(h.store.metadata("b").unwrap().is_none());
    assert_eq!(h.store.keys(), vec!["a".to_string()]);
}

#[test]
fn test_snapshot_write_reclaims_expired_snapshots() {
    let h = harness_with(Config::default(), 4096, None);
    for i in 0..5 {
        h.store.set("old", &i, SetOptions::default()).unwrap();
    }
    h.store.set("a", &"v1", SetOptions::default()).unwrap();
    h.clock.advance(DAY * 31);

    // Room for the rewritten record and registry, not for a new snapshot
    fill_leaving(&h, 37);
    h.store.set("a", &"v2", SetOptions::default()).unwrap();

    let snapshots = h.store.snapshots("a").unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].timestamp, T0 + 31 * 24 * 60 * 60 * 1000);
    assert!(h.store.snapshots("old").unwrap().is_empty());

    let mut medium = h.medium.clone();
    medium.write(&h.record("a"), "{not json").unwrap();
    assert_eq!(h.store.get("a", GetOptions::default()).unwrap(), Some(json!("v2")));
}

#[test]
fn test_snapshot_that_never_fits_keeps_the_write() {
    let h = harness_with(Config::default(), 4096, None);
    h.store.set("a", &"v1", SetOptions::default()).unwrap();

    fill_leaving(&h, 37);
    h.store.set("a", &"v2", SetOptions::default()).unwrap();

    assert_eq!(h.store.get("a", GetOptions::default()).unwrap(), Some(json!("v2")));
    assert_eq!(h.store.metadata("a").unwrap().unwrap().version, 2);
    assert_eq!(h.store.snapshots("a").unwrap().len(), 1);
}

// =============================================================================
// Overflow
// =============================================================================

#[test]
fn test_overflow_to_secondary() {
    let (h, backend) = with_backend(1024, Duration::from_secs(2));
    let value = oversized(1024);

    h.store.set("big", &value, SetOptions::default()).unwrap();

    assert_eq!(backend.len(), 1);
    assert!(h.medium.read(&h.record("big")).unwrap().is_none());

    let meta = h.store.metadata("big").unwrap().unwrap();
    assert_eq!(meta.tier, Tier::Secondary);
    assert_eq!(meta.version, 1);

    let fetched = h.store.fetch("big", true).unwrap().unwrap();
    assert_eq!(fetched.value, json!(value));
    assert_eq!(fetched.source, Source::Secondary);
}

#[test]
fn test_overflow_replaces_stale_primary_copy() {
    let (h, backend) = with_backend(1024, Duration::from_secs(2));
    h.store.set("k", &"fits", SetOptions::default()).unwrap();

    h.store.set("k", &oversized(1024), SetOptions::default()).unwrap();

    assert!(h.medium.read(&h.record("k")).unwrap().is_none());
    assert!(backend.record("k").is_some());
    assert_eq!(h.store.metadata("k").unwrap().unwrap().version, 2);
}

#[test]
fn test_write_back_to_primary_drops_secondary_copy() {
    let (h, backend) = with_backend(1024, Duration::from_secs(2));
    h.store.set("k", &oversized(1024), SetOptions::default()).unwrap();

    h.store.set("k", &"small again", SetOptions::default()).unwrap();

    assert!(backend.is_empty());
    assert_eq!(h.store.metadata("k").unwrap().unwrap().tier, Tier::Primary);
    let fetched = h.store.fetch("k", true).unwrap().unwrap();
    assert_eq!(fetched.source, Source::Primary);
}

#[test]
fn test_remove_reaches_secondary() {
    let (h, backend) = with_backend(1024, Duration::from_secs(2));
    h.store.set("k", &oversized(1024), SetOptions::default()).unwrap();

    assert!(h.store.remove("k").unwrap());

    assert!(backend.is_empty());
    assert_eq!(h.store.get("k", GetOptions::default()).unwrap(), None);
}

#[test]
fn test_secondary_offline_reports_unavailable() {
    let (h, backend) = with_backend(1024, Duration::from_secs(2));
    backend.set_offline(true);

    let err = h
        .store
        .set("big", &oversized(1024), SetOptions::default())
        .unwrap_err();

    assert!(matches!(err, DuraError::SecondaryStoreUnavailable(_)));
    assert!(h.store.metadata("big").unwrap().is_none());
}

#[test]
fn test_slow_secondary_times_out() {
    let (h, backend) = with_backend(1024, Duration::from_millis(50));
    backend.set_latency(Duration::from_millis(500));

    let started = Instant::now();
    let err = h
        .store
        .set("big", &oversized(1024), SetOptions::default())
        .unwrap_err();

    assert!(matches!(err, DuraError::SecondaryStoreUnavailable(_)));
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[test]
fn test_secondary_failure_on_tracked_key_surfaces() {
    let (h, backend) = with_backend(1024, Duration::from_secs(2));
    h.store.set("big", &oversized(1024), SetOptions::default()).unwrap();
    backend.set_offline(true);

    assert!(matches!(
        h.store.fetch("big", true),
        Err(DuraError::SecondaryStoreUnavailable(_))
    ));
    assert_eq!(
        h.store.get("big", GetOptions::with_fallback(json!("none"))).unwrap(),
        Some(json!("none"))
    );
    // Untracked keys still read as absent
    assert_eq!(h.store.fetch("other", true).unwrap(), None);
}
