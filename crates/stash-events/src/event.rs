use std::fmt;

/// All event types emitted by stash operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StashEvent {
    /// A request for an asset was answered.
    Served {
        asset: AssetKind,
        target: String,
        source: ServeSource,
    },
    /// An asset was downloaded from the remote registry.
    OriginFetched { url: String, bytes: u64 },
    /// A downloaded tarball was written to the content store.
    TarballStored { tarball: String },
    /// Reconciliation of a package started.
    IndexStarted { package: String },
    /// Reconciliation of a package finished and the metadata was persisted.
    IndexCompleted {
        package: String,
        added: usize,
        removed: usize,
        skipped: usize,
    },
    /// Reconciliation of a package failed.
    IndexFailed { package: String, error: String },
    /// An index request was refused because the package is already being indexed.
    IndexRejected { package: String },
    /// Batch operation overall progress.
    BatchProgress {
        completed: u32,
        total: u32,
        failed: u32,
    },
    /// Background download of missing tarballs started.
    WarmStarted { package: String, missing: usize },
    /// A tarball was downloaded in the background.
    WarmFetched { tarball: String },
    /// A background tarball download failed.
    WarmFailed { tarball: String, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Metadata,
    Tarball,
}

/// Which branch of the cache-fill protocol produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
    FoundLocally,
    FetchedRemotely,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Metadata => write!(f, "metadata"),
            AssetKind::Tarball => write!(f, "tarball"),
        }
    }
}

impl fmt::Display for ServeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeSource::FoundLocally => write!(f, "found locally"),
            ServeSource::FetchedRemotely => write!(f, "fetched remotely"),
        }
    }
}
