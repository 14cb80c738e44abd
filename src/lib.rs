//! # durastore
//!
//! An embedded persistence core for client-resident data:
//! - Namespaced, versioned key/value records over a bounded primary medium
//! - Checksummed snapshots on every write, with count and age retention
//! - Transparent recovery of corrupt records from their newest valid snapshot
//! - Capacity reclamation and overflow to a SQLite secondary store
//! - Change notification, in-process and over TCP
//! - Versioned export/import bundles
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Store Facade                          │
//! │           (scope keys, validate, publish changes)            │
//! └──────┬──────────────┬──────────────┬───────────────┬────────┘
//!        │              │              │               │
//!        ▼              ▼              ▼               ▼
//!  ┌───────────┐ ┌────────────┐ ┌────────────┐ ┌──────────────┐
//!  │ Registry  │ │  Backups   │ │  Capacity  │ │  ChangeBus   │
//!  │ (metadata)│ │ (snapshots)│ │  (retry)   │ │ ─▶ transports│
//!  └─────┬─────┘ └─────┬──────┘ └──┬──────┬──┘ └──────────────┘
//!        │             │           │      │ (still full)
//!        ▼             ▼           ▼      ▼
//!  ┌──────────────────────────────────┐ ┌──────────────────┐
//!  │       Primary Medium             │ │ Secondary Store  │
//!  │ (memory, or journal-backed file) │ │ (worker + SQLite)│
//!  └──────────────────────────────────┘ └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use durastore::{GetOptions, SetOptions, Store};
//! use serde_json::json;
//!
//! let store = Store::builder().standard_schemas().init()?;
//! store.set("user_1", &json!({"id": 1, "email": "a@b.com"}), SetOptions::default())?;
//! let user = store.get("user_1", GetOptions::default())?;
//! assert_eq!(user, Some(json!({"id": 1, "email": "a@b.com"})));
//! # Ok::<(), durastore::DuraError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod clock;

pub mod journal;
pub mod medium;
pub mod keyspace;
pub mod schema;

pub mod registry;
pub mod backup;
pub mod recovery;
pub mod capacity;
pub mod secondary;

pub mod notify;
pub mod protocol;
pub mod network;

pub mod store;
pub mod transfer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DuraError, Result};
pub use config::Config;
pub use clock::{Clock, ManualClock, SystemClock};
pub use schema::Schema;
pub use store::{Context, Fetched, GetOptions, SetOptions, Source, Store, StoreStats};
pub use transfer::ExportBundle;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of durastore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
