//! In-memory medium
//!
//! BTreeMap-based medium behind a shared lock. Cloning a `MemoryMedium`
//! yields another handle to the same storage, which is how two stores (two
//! execution contexts) can share one medium.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DuraError, Result};

use super::{entry_cost, Medium};

#[derive(Debug, Default)]
struct Inner {
    data: BTreeMap<String, String>,
    used: usize,
}

/// Bounded in-memory medium
#[derive(Debug, Clone)]
pub struct MemoryMedium {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
}

impl MemoryMedium {
    /// Create an empty medium holding at most `capacity` live bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            capacity,
        }
    }

    /// Number of stored keys (all namespaces)
    pub fn len(&self) -> usize {
        self.inner.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Medium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().data.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock();

        let old_cost = inner
            .data
            .get(key)
            .map(|v| entry_cost(key, v))
            .unwrap_or(0);
        let new_cost = entry_cost(key, value);
        let projected = inner.used - old_cost + new_cost;

        if projected > self.capacity && new_cost > old_cost {
            return Err(DuraError::CapacityExceeded {
                key: key.to_string(),
                needed: new_cost.saturating_sub(old_cost),
                available: self.capacity.saturating_sub(inner.used),
            });
        }

        inner.data.insert(key.to_string(), value.to_string());
        inner.used = projected;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        match inner.data.remove(key) {
            Some(value) => {
                inner.used -= entry_cost(key, &value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self, prefix: &str) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn used_bytes(&self) -> usize {
        self.inner.lock().used
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }
}
