//! Tests for the core read/write/remove operations

use durastore::medium::Medium;
use durastore::notify::ChangeEvent;
use durastore::{DuraError, GetOptions, SetOptions};
use serde_json::json;

use super::{harness, PREFIX};

#[test]
fn test_set_then_get_round_trip() {
    let h = harness();
    let value = json!({"nested": {"list": [1, 2.5, "three", null]}, "flag": true});

    h.store.set("settings", &value, SetOptions::default()).unwrap();

    assert_eq!(h.store.get("settings", GetOptions::default()).unwrap(), Some(value));
}

#[test]
fn test_get_absent_returns_fallback() {
    let h = harness();

    assert_eq!(h.store.get("missing", GetOptions::default()).unwrap(), None);
    assert_eq!(
        h.store
            .get("missing", GetOptions::with_fallback(json!([])))
            .unwrap(),
        Some(json!([]))
    );
}

#[test]
fn test_version_increments_per_write() {
    let h = harness();

    for i in 1..=3u64 {
        h.store.set("counter", &i, SetOptions::default()).unwrap();
        assert_eq!(h.store.metadata("counter").unwrap().unwrap().version, i);
    }
}

#[test]
fn test_failed_write_leaves_version_and_value() {
    let h = harness();
    let good = json!({"id": 1, "email": "a@b.com"});
    h.store.set("user_1", &good, SetOptions::default()).unwrap();

    let err = h
        .store
        .set("user_1", &json!({"id": 1}), SetOptions::default())
        .unwrap_err();

    assert!(matches!(err, DuraError::ValidationFailed { .. }));
    let meta = h.store.metadata("user_1").unwrap().unwrap();
    assert_eq!(meta.version, 1);
    assert_eq!(meta.size_bytes, serde_json::to_string(&good).unwrap().len());
    assert_eq!(h.store.get("user_1", GetOptions::default()).unwrap(), Some(good));
}

#[test]
fn test_validation_can_be_skipped() {
    let h = harness();
    let opts = SetOptions {
        validate: false,
        ..SetOptions::default()
    };

    h.store.set("user_2", &json!({"id": 2}), opts).unwrap();

    let read = GetOptions {
        validate: false,
        ..GetOptions::default()
    };
    assert_eq!(h.store.get("user_2", read).unwrap(), Some(json!({"id": 2})));
}

#[test]
fn test_requests_family_validates_each_entry() {
    let h = harness();

    h.store
        .set("requests_7", &json!([{"id": 1, "userId": 7}]), SetOptions::default())
        .unwrap();
    let err = h
        .store
        .set("requests_7", &json!([{"id": 2, "userId": ""}]), SetOptions::default())
        .unwrap_err();

    match err {
        DuraError::ValidationFailed { key, reason } => {
            assert_eq!(key, "requests_7");
            assert!(reason.contains("userId"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_null_value_rejected() {
    let h = harness();
    let err = h
        .store
        .set("anything", &serde_json::Value::Null, SetOptions::default())
        .unwrap_err();
    assert!(matches!(err, DuraError::ValidationFailed { .. }));
}

#[test]
fn test_invalid_keys_rejected() {
    let h = harness();

    for key in ["", "__metadata__", "__backup__x"] {
        assert!(matches!(
            h.store.set(key, &1, SetOptions::default()),
            Err(DuraError::InvalidKey(_))
        ));
        assert!(matches!(
            h.store.get(key, GetOptions::default()),
            Err(DuraError::InvalidKey(_))
        ));
    }
    assert!(matches!(
        h.store.set(PREFIX, &1, SetOptions::default()),
        Err(DuraError::InvalidKey(_))
    ));
}

#[test]
fn test_prefixed_key_is_scoped_once() {
    let h = harness();

    h.store
        .set(&format!("{}vehicles", PREFIX), &json!([{"id": 1, "licensePlate": "AB-1"}]), SetOptions::default())
        .unwrap();

    assert!(h.store.get("vehicles", GetOptions::default()).unwrap().is_some());
    assert_eq!(h.store.keys(), vec!["vehicles".to_string()]);
    assert!(h.medium.read(&h.record("vehicles")).unwrap().is_some());
}

#[test]
fn test_remove_keeps_snapshots() {
    let h = harness();
    h.store.set("draft", &"text", SetOptions::default()).unwrap();

    assert!(h.store.remove("draft").unwrap());

    assert_eq!(h.store.get("draft", GetOptions::default()).unwrap(), None);
    assert!(h.store.metadata("draft").unwrap().is_none());
    assert_eq!(h.store.snapshots("draft").unwrap().len(), 1);
    assert!(!h.store.remove("draft").unwrap());
}

#[test]
fn test_clear_all_stays_inside_namespace() {
    let h = harness();
    let mut foreign = h.medium.clone();
    foreign.write("other_app_key", "keep me").unwrap();

    h.store.set("a", &1, SetOptions::default()).unwrap();
    h.store.set("b", &2, SetOptions::default()).unwrap();

    assert_eq!(h.store.clear_all().unwrap(), 5); // 2 records + 2 snapshots + metadata

    assert!(h.store.keys().is_empty());
    assert!(h.medium.keys(PREFIX).is_empty());
    assert_eq!(
        h.medium.read("other_app_key").unwrap().as_deref(),
        Some("keep me")
    );
}

#[test]
fn test_mutations_publish_events_in_order() {
    let h = harness();
    let (events, _sub) = h.record_events();

    h.store.set("k", &json!({"v": 1}), SetOptions::default()).unwrap();
    h.store.remove("k").unwrap();
    h.store.remove("k").unwrap();
    h.store.clear_all().unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], ChangeEvent::Written { key, value, .. } if key == "k" && *value == json!({"v": 1})));
    assert!(matches!(&events[1], ChangeEvent::Removed { key, .. } if key == "k"));
    assert!(matches!(events[2], ChangeEvent::Cleared { .. }));
}

#[test]
fn test_failed_write_publishes_nothing() {
    let h = harness();
    let (events, _sub) = h.record_events();

    let _ = h.store.set("user_9", &json!({}), SetOptions::default());

    assert!(events.lock().unwrap().is_empty());
}
