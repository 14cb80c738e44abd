//! Change notification tests
//!
//! In-process bus dispatch, the event wire codec, the TCP feed, and the
//! events stores publish through all of them.

mod store_event_tests;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use durastore::notify::{ChangeBus, ChangeEvent, EventKind, Subscription};

/// Subscribe a collecting handler to `bus`
pub fn collect(bus: &ChangeBus, kind: EventKind) -> (Arc<Mutex<Vec<ChangeEvent>>>, Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let sub = bus.subscribe(kind, move |event| sink.lock().unwrap().push(event.clone()));
    (events, sub)
}

/// Poll `condition` until it holds or five seconds pass
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

pub fn written(key: &str, n: i64) -> ChangeEvent {
    ChangeEvent::Written {
        key: key.to_string(),
        value: serde_json::json!({ "n": n }),
        timestamp: 1_700_000_000_000,
    }
}
