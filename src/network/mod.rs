//! Network Module
//!
//! TCP change feed between processes sharing one storage medium.
//!
//! ## Architecture
//! - [`FeedPublisher`]: single acceptor thread; every event published on the
//!   bus it is attached to is broadcast to all connected peers
//! - [`FeedSubscriber`]: one reader thread per connection, delivering frames
//!   into a local [`ChangeBus`](crate::notify::ChangeBus)
//!
//! Delivery is best-effort. A peer that fails a write is dropped.

mod connection;
mod publisher;
mod subscriber;

pub use publisher::FeedPublisher;
pub use subscriber::FeedSubscriber;
