//! Per-package exclusion for the indexing engine.
//!
//! Unlike a lock, a busy package rejects the second caller instead of queueing it.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::debug;

use crate::{
    error::{StashError, StashResult},
    package::Package,
};

/// Set of packages currently being indexed.
///
/// Clones share the same set.
#[derive(Clone, Debug, Default)]
pub struct IndexGuard {
    active: Arc<Mutex<HashSet<Package>>>,
}

impl IndexGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `pkg` as being indexed, or returns `None` if it already is.
    ///
    /// The mark is removed when the returned permit is dropped.
    pub fn try_acquire(&self, pkg: &Package) -> Option<IndexPermit> {
        if !self.lock().insert(pkg.clone()) {
            debug!(pkg = %pkg, "index already in progress");
            return None;
        }

        Some(IndexPermit {
            active: Arc::clone(&self.active),
            package: pkg.clone(),
        })
    }

    /// Like [`IndexGuard::try_acquire`], failing with [`StashError::AlreadyInProgress`].
    pub fn acquire(&self, pkg: &Package) -> StashResult<IndexPermit> {
        self.try_acquire(pkg)
            .ok_or_else(|| StashError::AlreadyInProgress(pkg.to_string()))
    }

    pub fn is_active(&self, pkg: &Package) -> bool {
        self.lock().contains(pkg)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    // The set stays consistent even if a holder panicked, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashSet<Package>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof that the holder may index [`IndexPermit::package`].
#[derive(Debug)]
pub struct IndexPermit {
    active: Arc<Mutex<HashSet<Package>>>,
    package: Package,
}

impl IndexPermit {
    pub fn package(&self) -> &Package {
        &self.package
    }
}

impl Drop for IndexPermit {
    fn drop(&mut self) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.package);
    }
}
