use std::sync::Arc;

use stash_config::config::Config;
use stash_core::{FileStore, IndexGuard, Package, StashResult, Store};
use stash_dl::{http_client::configure_http_client, Fetch, HttpOrigin};
use stash_events::{EventSinkHandle, StashEvent};
use tracing::debug;

/// Everything an operation needs: configuration, storage, the origin registry, the
/// per-package index guard and the event sink.
///
/// Cheap to clone; clones share the guard, so a package being indexed through one clone is
/// busy for all of them.
#[derive(Clone)]
pub struct StashContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: Config,
    store: Arc<dyn Store>,
    origin: Arc<dyn Fetch>,
    guard: IndexGuard,
    events: EventSinkHandle,
}

impl StashContext {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        origin: Arc<dyn Fetch>,
        events: EventSinkHandle,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                store,
                origin,
                guard: IndexGuard::new(),
                events,
            }),
        }
    }

    /// Builds a context on the filesystem store and HTTP origin described by `config`.
    ///
    /// Also applies the configured user agent and timeout to the shared HTTP client.
    pub fn from_config(config: Config, events: EventSinkHandle) -> StashResult<Self> {
        let tarball_root = config.get_storage_path()?;
        let metadata_root = config.get_metadata_path()?;
        debug!(
            tarballs = %tarball_root.display(),
            metadata = %metadata_root.display(),
            "opening store"
        );

        let user_agent = config.user_agent.clone();
        let timeout = config.timeout();
        configure_http_client(|cfg| {
            if user_agent.is_some() {
                cfg.user_agent = user_agent;
            }
            cfg.timeout = timeout;
        });

        Ok(Self::new(
            config,
            Arc::new(FileStore::new(tarball_root, metadata_root)),
            Arc::new(HttpOrigin::new()),
            events,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub fn origin(&self) -> &dyn Fetch {
        self.inner.origin.as_ref()
    }

    pub fn guard(&self) -> &IndexGuard {
        &self.inner.guard
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.inner.events
    }

    pub fn emit(&self, event: StashEvent) {
        self.inner.events.emit(event);
    }

    /// A package on the configured registry.
    pub fn package(&self, scope: &str, name: &str) -> Package {
        Package::new(self.config().registry(), scope, name)
    }
}
