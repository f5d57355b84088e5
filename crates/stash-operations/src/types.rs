use stash_core::{Package, Reconciliation};
use stash_events::ServeSource;

// ---- Cache fill ----

/// Bytes answered for a metadata or tarball request.
#[derive(Debug)]
pub struct Served {
    pub bytes: Vec<u8>,
    pub source: ServeSource,
}

impl Served {
    pub fn local(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            source: ServeSource::FoundLocally,
        }
    }

    pub fn remote(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            source: ServeSource::FetchedRemotely,
        }
    }

    /// Whether the bytes came from the origin registry unmodified.
    pub fn is_remote(&self) -> bool {
        self.source == ServeSource::FetchedRemotely
    }
}

// ---- Index ----

/// How an index request waits for the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexMode {
    /// Run on the calling thread and report the result.
    #[default]
    Sync,
    /// Run in the background; the caller only learns that the request was accepted.
    Async,
}

/// Result of an accepted index request.
#[derive(Debug)]
pub enum IndexOutcome {
    Completed(Reconciliation),
    Accepted,
}

// ---- Bulk ----

/// Info about a successfully reindexed package.
#[derive(Debug)]
pub struct IndexedInfo {
    pub package: Package,
    pub versions: usize,
    pub added: usize,
    pub removed: usize,
    pub skipped: usize,
}

/// Info about a failed operation.
#[derive(Debug)]
pub struct FailedInfo {
    pub package: Package,
    pub error: String,
}

/// Report returned after a whole-store reindex.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub indexed: Vec<IndexedInfo>,
    pub failed: Vec<FailedInfo>,
}

impl BulkReport {
    pub fn total(&self) -> usize {
        self.indexed.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

// ---- Warm ----

/// Report of a background tarball download run.
#[derive(Debug, Default)]
pub struct WarmReport {
    pub fetched: Vec<String>,
    pub failed: Vec<(String, String)>,
}
