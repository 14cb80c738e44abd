//! Feed subscriber
//!
//! Connects to a [`FeedPublisher`](super::FeedPublisher) and delivers each
//! received event into a local bus.

use std::io::BufReader;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::Result;
use crate::notify::ChangeBus;
use crate::protocol::read_event;

use super::connection::is_disconnect;

pub struct FeedSubscriber {
    stream: TcpStream,
    reader: Option<JoinHandle<()>>,
    received: Arc<AtomicU64>,
    peer_addr: String,
}

impl FeedSubscriber {
    /// Connect to a feed and start delivering its events into `bus`
    ///
    /// Inbound events are dispatched with [`ChangeBus::deliver`], so they are
    /// not forwarded again through the bus's own transports.
    pub fn connect<A: ToSocketAddrs>(addr: A, bus: ChangeBus) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let received = Arc::new(AtomicU64::new(0));
        let reader = {
            let mut reader = BufReader::new(stream.try_clone()?);
            let received = Arc::clone(&received);
            let peer = peer_addr.clone();
            std::thread::Builder::new()
                .name("durastore-feed-reader".to_string())
                .spawn(move || loop {
                    match read_event(&mut reader) {
                        Ok(event) => {
                            tracing::trace!(peer = %peer, kind = ?event.kind(), "feed event");
                            received.fetch_add(1, Ordering::Relaxed);
                            bus.deliver(&event);
                        }
                        Err(e) if is_disconnect(&e) => {
                            tracing::debug!(peer = %peer, "feed closed");
                            return;
                        }
                        Err(e) => {
                            tracing::warn!(peer = %peer, error = %e, "feed read failed");
                            return;
                        }
                    }
                })?
        };

        tracing::debug!(peer = %peer_addr, "subscribed to change feed");
        Ok(Self {
            stream,
            reader: Some(reader),
            received,
            peer_addr,
        })
    }

    /// Events delivered so far
    pub fn received_count(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Close the connection and wait for the reader thread
    pub fn shutdown(mut self) {
        self.close();
    }

    /// Block until the publisher closes the feed
    pub fn join(mut self) {
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FeedSubscriber {
    fn drop(&mut self) {
        self.close();
    }
}
