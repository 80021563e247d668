use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal shared between a run and its caller.
///
/// Checked before each tree starts and again before its writes are
/// committed, so a tree is either fully written or not written at all.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One mutex per tree root, shared by every run using the same propagator.
///
/// Holding a tree's lock across read, aggregate and commit prevents two
/// concurrent runs on the same Fund from interleaving their writes.
#[derive(Debug, Default)]
pub struct TreeLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TreeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, root_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(root_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
