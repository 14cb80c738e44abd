//! In-memory backend
//!
//! Clones share state, so a test can keep a handle after moving the backend
//! into a [`SecondaryStore`](super::SecondaryStore) and flip it offline or
//! slow it down.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{DuraError, Result};

use super::SecondaryBackend;

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, (String, u64)>,
    offline: bool,
    latency: Duration,
}

/// Shared in-memory overflow records
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails as unavailable
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Delay applied before every operation
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored value and timestamp for `key`
    pub fn record(&self, key: &str) -> Option<(String, u64)> {
        self.inner.lock().records.get(key).cloned()
    }

    fn enter(&self) -> Result<parking_lot::MutexGuard<'_, Inner>> {
        let latency = self.inner.lock().latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let inner = self.inner.lock();
        if inner.offline {
            return Err(DuraError::SecondaryStoreUnavailable(
                "backend offline".to_string(),
            ));
        }
        Ok(inner)
    }
}

impl SecondaryBackend for MemoryBackend {
    fn put(&mut self, key: &str, value: &str, stored_at: u64) -> Result<()> {
        self.enter()?
            .records
            .insert(key.to_string(), (value.to_string(), stored_at));
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.enter()?.records.get(key).map(|(v, _)| v.clone()))
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.enter()?.records.remove(key).is_some())
    }

    fn clear(&mut self) -> Result<usize> {
        let mut inner = self.enter()?;
        let removed = inner.records.len();
        inner.records.clear();
        Ok(removed)
    }

    fn keys(&mut self) -> Result<Vec<String>> {
        Ok(self.enter()?.records.keys().cloned().collect())
    }
}
