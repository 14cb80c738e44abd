//! Tests for the events stores publish

use std::sync::Arc;

use durastore::medium::MemoryMedium;
use durastore::network::{FeedPublisher, FeedSubscriber};
use durastore::notify::{ChangeBus, ChangeEvent, EventKind};
use durastore::{Context, ManualClock, SetOptions, Store};
use serde_json::json;

use super::{collect, eventually};

const T0: u64 = 1_700_000_000_000;

fn store_on(context: Context, medium: &MemoryMedium) -> Store {
    Store::builder()
        .context(context)
        .medium(medium.clone())
        .init()
        .unwrap()
}

#[test]
fn test_every_mutation_publishes() {
    let context = Context::with_clock(Arc::new(ManualClock::new(T0)));
    let store = store_on(context, &MemoryMedium::new(64 * 1024));
    let (events, _sub) = collect(store.bus(), EventKind::All);

    store.set("k", &json!(1), SetOptions::default()).unwrap();
    store.remove("k").unwrap();
    let bundle = store.export_all().unwrap();
    store.import_all(&bundle).unwrap();
    store.clear_all().unwrap();

    let kinds: Vec<EventKind> = events.lock().unwrap().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Written, EventKind::Removed, EventKind::Imported, EventKind::Cleared]
    );
    assert!(events.lock().unwrap().iter().all(|e| e.timestamp() == T0));
}

#[test]
fn test_stores_sharing_a_context_see_each_other() {
    let context = Context::new();
    let medium = MemoryMedium::new(64 * 1024);
    let writer = store_on(context.clone(), &medium);
    let reader = store_on(context, &medium);
    let (events, _sub) = collect(reader.bus(), EventKind::Written);

    writer.set("shared", &json!({"v": 1}), SetOptions::default()).unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
    reader.reload().unwrap();
    assert_eq!(reader.keys(), vec!["shared"]);
}

#[test]
fn test_store_events_over_tcp() {
    let publisher = FeedPublisher::bind("127.0.0.1:0").unwrap();
    let context = Context::new();
    context.bus().attach(Box::new(publisher.clone()));
    let store = store_on(context, &MemoryMedium::new(64 * 1024));

    let remote = ChangeBus::new();
    let _subscriber = FeedSubscriber::connect(publisher.local_addr(), remote.clone()).unwrap();
    assert!(eventually(|| publisher.peer_count() == 1));
    let (events, _sub) = collect(&remote, EventKind::All);

    store.set("user_1", &json!({"id": 1, "email": "a@b.com"}), SetOptions::default()).unwrap();

    assert!(eventually(|| events.lock().unwrap().len() == 1));
    match &events.lock().unwrap()[0] {
        ChangeEvent::Written { key, value, .. } => {
            assert_eq!(key, "user_1");
            assert_eq!(value["email"], "a@b.com");
        }
        other => panic!("unexpected event: {other:?}"),
    };
}
