//! Change Notification Channel
//!
//! Best-effort liveness signal fired after every committed write, removal,
//! import and clear. Not persisted: a context that was not listening when an
//! event fired misses it and must re-read state.
//!
//! ## Transports
//! A [`ChangeBus`] dispatches to in-process subscribers and then forwards to
//! any attached [`ChangeTransport`]:
//! - [`ChannelTransport`]: crossbeam channel to another thread
//! - [`FeedPublisher`](crate::network::FeedPublisher): TCP broadcast to other processes

mod bus;
mod channel;
mod event;

pub use bus::{ChangeBus, Subscription};
pub use channel::ChannelTransport;
pub use event::{ChangeEvent, EventKind};

use crate::error::Result;

/// Out-of-process delivery of change events
pub trait ChangeTransport: Send + Sync {
    fn forward(&self, event: &ChangeEvent) -> Result<()>;

    fn name(&self) -> &str;
}
