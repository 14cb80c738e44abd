//! Feed publisher
//!
//! Accepts subscribers and broadcasts framed change events to them.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{DuraError, Result};
use crate::notify::{ChangeEvent, ChangeTransport};
use crate::protocol::encode_event;

use super::connection::Peer;

const ACCEPT_POLL: Duration = Duration::from_millis(20);

struct Inner {
    local_addr: SocketAddr,
    peers: Arc<Mutex<Vec<Peer>>>,
    shutdown: Arc<AtomicBool>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// TCP broadcaster of change events
///
/// Cloning yields another handle to the same listener, so one handle can be
/// attached to a bus while another is kept for `local_addr` and `shutdown`.
#[derive(Clone)]
pub struct FeedPublisher {
    inner: Arc<Inner>,
}

impl FeedPublisher {
    /// Listen on `addr` and start accepting subscribers
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let peers = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let acceptor = {
            let peers = Arc::clone(&peers);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("durastore-feed".to_string())
                .spawn(move || accept_loop(listener, peers, shutdown))?
        };

        tracing::info!(addr = %local_addr, "change feed listening");
        Ok(Self {
            inner: Arc::new(Inner {
                local_addr,
                peers,
                shutdown,
                acceptor: Mutex::new(Some(acceptor)),
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.lock().len()
    }

    /// Stop accepting and disconnect every peer
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.acceptor.lock().take() {
            let _ = handle.join();
        }
        self.inner.peers.lock().clear();
    }
}

impl ChangeTransport for FeedPublisher {
    fn forward(&self, event: &ChangeEvent) -> Result<()> {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return Err(DuraError::Network("feed shut down".to_string()));
        }
        let frame = encode_event(event)?;

        self.inner.peers.lock().retain_mut(|peer| match peer.send(&frame) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(peer = peer.peer_addr(), error = %e, "dropping feed peer");
                false
            }
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "tcp-feed"
    }
}

fn accept_loop(listener: TcpListener, peers: Arc<Mutex<Vec<Peer>>>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                let peer = stream
                    .set_nonblocking(false)
                    .map_err(DuraError::from)
                    .and_then(|_| Peer::new(stream));
                match peer {
                    Ok(peer) => {
                        tracing::debug!(peer = %addr, "feed subscriber connected");
                        peers.lock().push(peer);
                    }
                    Err(e) => tracing::warn!(peer = %addr, error = %e, "rejecting feed subscriber"),
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::sleep(ACCEPT_POLL),
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }
    tracing::debug!("change feed stopped accepting");
}
