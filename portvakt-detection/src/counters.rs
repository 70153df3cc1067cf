//! ## portvakt-detection::counters
//! **Per-address failure counts with thread-safe updates**
//!
//! Entries are created by the first failure from an address and afterwards
//! only incremented or reset to zero; nothing is evicted for the lifetime of
//! the process.

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct FailureCounters {
    attempts: RwLock<HashMap<String, u32>>,
}

impl FailureCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count for `address` and returns the new value.
    pub fn record_failure(&self, address: &str) -> u32 {
        let mut attempts = self.attempts.write();
        if let Some(count) = attempts.get_mut(address) {
            *count = count.saturating_add(1);
            return *count;
        }
        attempts.insert(address.to_string(), 1);
        1
    }

    /// Sets the count for `address` back to zero.
    pub fn reset(&self, address: &str) {
        if let Some(count) = self.attempts.write().get_mut(address) {
            *count = 0;
        }
    }

    /// Current count for `address`, `None` if it never failed.
    pub fn attempts(&self, address: &str) -> Option<u32> {
        self.attempts.read().get(address).copied()
    }

    /// Number of distinct addresses seen.
    pub fn len(&self) -> usize {
        self.attempts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.read().is_empty()
    }
}
