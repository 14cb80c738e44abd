//! Store context
//!
//! The collaborators a store shares with the rest of the process: the change
//! bus and the time source. A context is built once and handed to every
//! store that should see the same events.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::notify::ChangeBus;

#[derive(Clone)]
pub struct Context {
    bus: ChangeBus,
    clock: Arc<dyn Clock>,
}

impl Context {
    /// A fresh bus and the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            bus: ChangeBus::new(),
            clock,
        }
    }

    /// Share an existing bus
    pub fn with_bus(mut self, bus: ChangeBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Drop every subscriber and transport on the bus
    pub fn shutdown(&self) {
        self.bus.shutdown();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("bus", &self.bus)
            .field("now", &self.clock.now_millis())
            .finish()
    }
}
