//! Processed-message cache: remembers which inbound message ids have been handled.
//!
//! Bounded by a capacity; when an insert would exceed it, the whole set is cleared first.
//! A flush forgets every id at once, so a redelivery arriving right after it is processed again.

use std::collections::HashSet;
use tokio::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Set of handled message ids, shared across concurrent deliveries.
pub struct ProcessedMessageCache {
    capacity: usize,
    inner: Mutex<HashSet<String>>,
}

impl Default for ProcessedMessageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProcessedMessageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(HashSet::new()),
        }
    }

    pub async fn already_processed(&self, id: &str) -> bool {
        self.inner.lock().await.contains(id)
    }

    pub async fn mark_processed(&self, id: &str) {
        let mut set = self.inner.lock().await;
        self.insert_bounded(&mut set, id);
    }

    /// Record `id` and return true if it was not yet known; false for a duplicate.
    /// Check and insert happen under one lock, so concurrent deliveries of the same id
    /// see exactly one `true`.
    pub async fn check_and_mark(&self, id: &str) -> bool {
        let mut set = self.inner.lock().await;
        if set.contains(id) {
            return false;
        }
        self.insert_bounded(&mut set, id);
        true
    }

    /// Number of ids currently remembered.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    fn insert_bounded(&self, set: &mut HashSet<String>, id: &str) {
        if set.contains(id) {
            return;
        }
        if set.len() >= self.capacity {
            log::info!(
                "pipeline: processed-message cache reached {} entries, clearing",
                set.len()
            );
            set.clear();
        }
        set.insert(id.to_string());
    }
}
