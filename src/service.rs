//! Shared handle to the currently served snapshot.
//!
//! Readers clone the `Arc` and run against an immutable snapshot without
//! holding any lock; re-indexing builds a new snapshot off to the side and
//! swaps the pointer atomically. Readers in flight keep the old snapshot
//! alive until they finish.

use std::sync::{Arc, RwLock};

use crate::store::Snapshot;

/// Atomically swappable, reference-counted snapshot pointer.
pub struct GraphService {
    current: RwLock<Arc<Snapshot>>,
}

impl GraphService {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Grab the current snapshot for one or more queries.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Install a fully built snapshot, returning the replaced one.
    pub fn swap(&self, next: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }
}
