//! Per-family locks serializing multi-step lifecycle transitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Hands out one mutex per rule family.
///
/// Promotion and mutation application hold their family's lock for the whole
/// read-check-write sequence. Unrelated families never contend.
#[derive(Default)]
pub struct LineageLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LineageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared lock for `family`, created on first use.
    ///
    /// Callers lock the returned handle; the registry mutex itself is only
    /// held while looking the handle up.
    pub fn handle(&self, family: &str) -> Arc<Mutex<()>> {
        let mut guard = self.locks.lock().expect("lineage lock registry poisoned");
        guard
            .entry(family.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding the family's lock.
    pub fn with_family<T>(&self, family: &str, f: impl FnOnce() -> T) -> T {
        let handle = self.handle(family);
        let _guard = handle.lock().expect("lineage lock poisoned");
        f()
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .expect("lineage lock registry poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
