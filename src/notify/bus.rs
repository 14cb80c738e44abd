//! In-process change bus

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::{ChangeEvent, ChangeTransport, EventKind};

type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<Subscriber>>,
    transports: RwLock<Vec<Box<dyn ChangeTransport>>>,
}

/// Publish/subscribe bus for change events
///
/// Cloning yields another handle to the same bus. Dispatch is synchronous,
/// in publish order, on the publishing thread; handlers may subscribe or
/// unsubscribe from inside a callback.
#[derive(Clone, Default)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every event matching `kind`
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push(Subscriber {
            id,
            kind,
            handler: Arc::new(handler),
        });
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
            active: true,
        }
    }

    /// Forward every published event to `transport` as well
    pub fn attach(&self, transport: Box<dyn ChangeTransport>) {
        tracing::debug!(transport = transport.name(), "transport attached");
        self.inner.transports.write().push(transport);
    }

    /// Dispatch locally, then forward to every transport
    pub fn publish(&self, event: &ChangeEvent) {
        self.deliver(event);

        for transport in self.inner.transports.read().iter() {
            if let Err(e) = transport.forward(event) {
                tracing::warn!(
                    transport = transport.name(),
                    error = %e,
                    "change event not forwarded"
                );
            }
        }
    }

    /// Dispatch to local subscribers only (inbound remote events)
    pub fn deliver(&self, event: &ChangeEvent) {
        let handlers: Vec<Handler> = self
            .inner
            .subscribers
            .read()
            .iter()
            .filter(|s| s.kind.matches(event))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    pub fn transport_count(&self) -> usize {
        self.inner.transports.read().len()
    }

    /// Drop every subscriber and transport
    pub fn shutdown(&self) {
        self.inner.subscribers.write().clear();
        self.inner.transports.write().clear();
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscriber_count())
            .field("transports", &self.transport_count())
            .finish()
    }
}

/// Handle to a registered handler; unsubscribes when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the handler registered for the life of the bus
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.write().retain(|s| s.id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
