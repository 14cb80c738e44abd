//! Secondary Store Adapter
//!
//! Larger-capacity overflow store used only when the primary medium still
//! rejects a write after cleanup.
//!
//! ## Architecture
//! ```text
//!   caller ──Request──▶ crossbeam channel ──▶ worker thread ──▶ SecondaryBackend
//!     ▲                                            │
//!     └────────── Pending<T>::wait (timeout) ◀─────┘
//! ```
//!
//! The backend lives on its own thread, so callers only block inside
//! [`Pending::wait`], bounded by a timeout. A timed-out request is reported
//! as [`DuraError::SecondaryStoreUnavailable`] and never retried; it may still
//! complete on the worker afterwards.

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{DuraError, Result};

/// Synchronous storage behind the secondary worker
pub trait SecondaryBackend: Send {
    fn put(&mut self, key: &str, value: &str, stored_at: u64) -> Result<()>;

    fn get(&mut self, key: &str) -> Result<Option<String>>;

    fn delete(&mut self, key: &str) -> Result<bool>;

    /// Remove every record, returning how many existed
    fn clear(&mut self) -> Result<usize>;

    /// All stored keys in sorted order
    fn keys(&mut self) -> Result<Vec<String>>;
}

type Reply<T> = Sender<Result<T>>;

enum Request {
    Put {
        key: String,
        value: String,
        stored_at: u64,
        reply: Reply<()>,
    },
    Get {
        key: String,
        reply: Reply<Option<String>>,
    },
    Delete {
        key: String,
        reply: Reply<bool>,
    },
    Clear {
        reply: Reply<usize>,
    },
    Keys {
        reply: Reply<Vec<String>>,
    },
}

/// The eventual result of a secondary store call
#[must_use = "a pending secondary call does nothing unless waited on"]
pub struct Pending<T> {
    rx: Receiver<Result<T>>,
    timeout: Duration,
    op: &'static str,
}

impl<T> Pending<T> {
    /// Block until the call resolves or the configured timeout elapses
    pub fn wait(self) -> Result<T> {
        let timeout = self.timeout;
        self.wait_timeout(timeout)
    }

    /// Block until the call resolves or `timeout` elapses
    pub fn wait_timeout(self, timeout: Duration) -> Result<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(op = self.op, ?timeout, "secondary store timed out");
                Err(DuraError::SecondaryStoreUnavailable(format!(
                    "{} timed out after {:?}",
                    self.op, timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(DuraError::SecondaryStoreUnavailable(
                format!("{}: worker stopped", self.op),
            )),
        }
    }

    fn resolved(result: Result<T>, op: &'static str) -> Self {
        let (tx, rx) = channel::bounded(1);
        let _ = tx.send(result);
        Self {
            rx,
            timeout: Duration::ZERO,
            op,
        }
    }
}

struct Worker {
    tx: Mutex<Option<Sender<Request>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Asynchronous handle to an overflow backend
pub struct SecondaryStore {
    worker: Option<Worker>,
    timeout: Duration,
}

impl SecondaryStore {
    /// A store that is never available
    pub fn disabled() -> Self {
        Self {
            worker: None,
            timeout: Duration::ZERO,
        }
    }

    /// Move `backend` onto a worker thread
    pub fn spawn<B: SecondaryBackend + 'static>(backend: B, timeout: Duration) -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let handle = std::thread::Builder::new()
            .name("durastore-secondary".to_string())
            .spawn(move || run_worker(backend, rx))?;

        Ok(Self {
            worker: Some(Worker {
                tx: Mutex::new(Some(tx)),
                handle: Mutex::new(Some(handle)),
            }),
            timeout,
        })
    }

    /// Whether a backend is attached and its worker is running
    pub fn is_available(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.tx.lock().is_some())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn put(&self, key: &str, value: &str, stored_at: u64) -> Pending<()> {
        self.call("put", |reply| Request::Put {
            key: key.to_string(),
            value: value.to_string(),
            stored_at,
            reply,
        })
    }

    pub fn get(&self, key: &str) -> Pending<Option<String>> {
        self.call("get", |reply| Request::Get {
            key: key.to_string(),
            reply,
        })
    }

    pub fn delete(&self, key: &str) -> Pending<bool> {
        self.call("delete", |reply| Request::Delete {
            key: key.to_string(),
            reply,
        })
    }

    pub fn clear(&self) -> Pending<usize> {
        self.call("clear", |reply| Request::Clear { reply })
    }

    pub fn keys(&self) -> Pending<Vec<String>> {
        self.call("keys", |reply| Request::Keys { reply })
    }

    /// Stop the worker after it drains queued requests
    pub fn shutdown(&self) {
        let Some(worker) = &self.worker else {
            return;
        };
        drop(worker.tx.lock().take());
        if let Some(handle) = worker.handle.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("secondary worker panicked");
            }
        }
    }

    fn call<T>(&self, op: &'static str, build: impl FnOnce(Reply<T>) -> Request) -> Pending<T> {
        let unavailable =
            |why: &str| Pending::resolved(Err(DuraError::SecondaryStoreUnavailable(why.to_string())), op);

        let Some(worker) = &self.worker else {
            return unavailable("not configured");
        };
        let guard = worker.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return unavailable("shut down");
        };

        let (reply, rx) = channel::bounded(1);
        if tx.send(build(reply)).is_err() {
            return unavailable("worker stopped");
        }
        Pending {
            rx,
            timeout: self.timeout,
            op,
        }
    }
}

impl Drop for SecondaryStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<B: SecondaryBackend>(mut backend: B, rx: Receiver<Request>) {
    tracing::debug!("secondary worker started");

    // Replies to callers that already timed out are dropped silently
    for request in rx {
        match request {
            Request::Put {
                key,
                value,
                stored_at,
                reply,
            } => {
                let _ = reply.send(backend.put(&key, &value, stored_at));
            }
            Request::Get { key, reply } => {
                let _ = reply.send(backend.get(&key));
            }
            Request::Delete { key, reply } => {
                let _ = reply.send(backend.delete(&key));
            }
            Request::Clear { reply } => {
                let _ = reply.send(backend.clear());
            }
            Request::Keys { reply } => {
                let _ = reply.send(backend.keys());
            }
        }
    }

    tracing::debug!("secondary worker stopped");
}
