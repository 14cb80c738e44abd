//! Journal Module
//!
//! Append-only, checksummed log backing the durable primary medium.
//!
//! ## Responsibilities
//! - Append one entry per record write or delete
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Replay on open, truncating torn or corrupt tails
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{JournalEntry, Operation, HEADER_SIZE};
pub use writer::{JournalSink, JournalWriter};
pub use reader::{JournalIterator, JournalReader};
pub use recovery::{JournalRecovery, RecoveryResult};
