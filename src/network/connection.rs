//! Connection helpers
//!
//! Buffered peer streams and disconnect classification shared by both ends
//! of the feed.

use std::io::{BufWriter, ErrorKind, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{DuraError, Result};

/// Write timeout for a publisher peer; a slower peer is dropped
pub(crate) const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A connected feed subscriber, as seen by the publisher
pub(crate) struct Peer {
    writer: BufWriter<TcpStream>,
    peer_addr: String,
}

impl Peer {
    pub(crate) fn new(stream: TcpStream) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(PEER_WRITE_TIMEOUT))?;

        Ok(Self {
            writer: BufWriter::new(stream),
            peer_addr,
        })
    }

    pub(crate) fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.write_all(frame)?;
        self.writer.flush()?;
        Ok(())
    }

    pub(crate) fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// True when `err` means the other side went away rather than misbehaved
pub(crate) fn is_disconnect(err: &DuraError) -> bool {
    match err {
        DuraError::Io(e) => matches!(
            e.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::NotConnected
        ),
        _ => false,
    }
}
