//! Medium Module
//!
//! The primary store: a bounded-capacity, synchronous string key/value
//! medium. Everything else in the crate is built on top of it.
//!
//! ## Responsibilities
//! - Point reads, writes and deletes of serialized values
//! - Prefix listing (for namespace-wide operations)
//! - Capacity accounting: live bytes = Σ (key length + value length)
//! - Reject writes that would exceed capacity with `CapacityExceeded`
//!
//! ## Implementations
//! - [`MemoryMedium`]: in-memory, clones share state
//! - [`JournalMedium`]: durable, replayed from an append-only journal

mod memory;
mod journal;

pub use journal::JournalMedium;
pub use memory::MemoryMedium;

use crate::error::Result;

/// Bounded synchronous key/value medium
pub trait Medium: Send {
    /// Read the stored value for `key`
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`
    ///
    /// Fails with `CapacityExceeded` (and stores nothing) if the write would
    /// push live bytes past capacity. Replacing a value charges only the
    /// size difference.
    fn write(&mut self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`, returning whether it existed
    fn delete(&mut self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`, in sorted order
    fn keys(&self, prefix: &str) -> Vec<String>;

    /// Live bytes currently stored
    fn used_bytes(&self) -> usize;

    /// Maximum live bytes
    fn capacity_bytes(&self) -> usize;

    /// Flush buffered state to durable storage
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    /// Live bytes under `prefix`
    fn bytes_under(&self, prefix: &str) -> usize {
        self.keys(prefix)
            .iter()
            .filter_map(|k| self.read(k).ok().flatten().map(|v| k.len() + v.len()))
            .sum()
    }
}

/// Bytes a single entry charges against capacity
pub(crate) fn entry_cost(key: &str, value: &str) -> usize {
    key.len() + value.len()
}
