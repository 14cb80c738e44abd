//! Channel transport
//!
//! Forwards published events into a crossbeam channel, for worker threads
//! that poll rather than register callbacks.

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{DuraError, Result};

use super::{ChangeEvent, ChangeTransport};

pub struct ChannelTransport {
    tx: Sender<ChangeEvent>,
}

impl ChannelTransport {
    /// A transport and the receiving end of its channel
    pub fn new() -> (Self, Receiver<ChangeEvent>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }
}

impl ChangeTransport for ChannelTransport {
    fn forward(&self, event: &ChangeEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| DuraError::Network("channel receiver dropped".to_string()))
    }

    fn name(&self) -> &str {
        "channel"
    }
}
