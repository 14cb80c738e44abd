//! Change events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A committed mutation of the namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeEvent {
    Written {
        key: String,
        value: Value,
        timestamp: u64,
    },
    Removed {
        key: String,
        timestamp: u64,
    },
    Imported {
        keys: Vec<String>,
        timestamp: u64,
    },
    Cleared {
        timestamp: u64,
    },
}

impl ChangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::Written { .. } => EventKind::Written,
            ChangeEvent::Removed { .. } => EventKind::Removed,
            ChangeEvent::Imported { .. } => EventKind::Imported,
            ChangeEvent::Cleared { .. } => EventKind::Cleared,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            ChangeEvent::Written { timestamp, .. }
            | ChangeEvent::Removed { timestamp, .. }
            | ChangeEvent::Imported { timestamp, .. }
            | ChangeEvent::Cleared { timestamp } => *timestamp,
        }
    }

    /// The single key this event concerns, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            ChangeEvent::Written { key, .. } | ChangeEvent::Removed { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Subscription filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Written,
    Removed,
    Imported,
    Cleared,
    /// Every event
    All,
}

impl EventKind {
    pub fn matches(self, event: &ChangeEvent) -> bool {
        self == EventKind::All || self == event.kind()
    }
}
