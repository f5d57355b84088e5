use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex,
    },
};

use flate2::{write::GzEncoder, Compression};
use stash_config::config::Config;
use stash_core::{FileStore, Package, StashResult, Store, Tarball};
use stash_dl::{Fetch, OriginError};
use stash_events::CollectorSink;

use crate::StashContext;

/// Ordered log of the side effects observed by the test doubles below.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn npm_tarball(name: &str, version: &str) -> Vec<u8> {
    let manifest = format!(r#"{{"name":"{name}","version":"{version}"}}"#);
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "package/package.json", manifest.as_bytes())
        .unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

pub fn test_context(dir: &Path, config: Config) -> (StashContext, Arc<CollectorSink>) {
    test_context_with(dir, config, Arc::new(CountingOrigin::default()))
}

pub fn test_context_with(
    dir: &Path,
    config: Config,
    origin: Arc<CountingOrigin>,
) -> (StashContext, Arc<CollectorSink>) {
    let events = Arc::new(CollectorSink::default());
    let ctx = StashContext::new(
        config,
        Arc::new(FileStore::new(dir, dir)),
        origin,
        events.clone(),
    );
    (ctx, events)
}

pub fn proxystash_config(fetch_all: bool) -> Config {
    Config {
        proxystash: Some(true),
        fetch_all: Some(fetch_all),
        ..Config::default_config()
    }
}

/// Origin serving canned responses and counting requests. Unknown URLs answer 404.
#[derive(Default)]
pub struct CountingOrigin {
    responses: HashMap<String, Result<Vec<u8>, u16>>,
    calls: AtomicUsize,
    journal: Option<Journal>,
}

impl CountingOrigin {
    pub fn journaled(journal: Journal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::default()
        }
    }

    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), Ok(body));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetch for CountingOrigin {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, OriginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(format!("fetch {url}"));
        }

        match self.responses.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => {
                Err(OriginError::Status {
                    status: *status,
                    url: url.to_string(),
                })
            }
            None => {
                Err(OriginError::NotFound {
                    url: url.to_string(),
                })
            }
        }
    }
}

/// Store recording writes and index runs into a [`Journal`].
pub struct JournalStore {
    inner: FileStore,
    journal: Journal,
}

impl JournalStore {
    pub fn new(inner: FileStore, journal: Journal) -> Self {
        Self {
            inner,
            journal,
        }
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

impl Store for JournalStore {
    fn put_tarball(&self, tarball: &Tarball, bytes: &[u8]) -> StashResult<()> {
        self.record(format!("store {tarball}"));
        self.inner.put_tarball(tarball, bytes)
    }

    fn get_tarball(&self, tarball: &Tarball) -> StashResult<Vec<u8>> {
        self.inner.get_tarball(tarball)
    }

    fn has_tarball(&self, tarball: &Tarball) -> bool {
        self.inner.has_tarball(tarball)
    }

    fn put_packument(&self, pkg: &Package, bytes: &[u8]) -> StashResult<()> {
        self.inner.put_packument(pkg, bytes)
    }

    fn get_packument_raw(&self, pkg: &Package) -> StashResult<Vec<u8>> {
        self.inner.get_packument_raw(pkg)
    }

    fn list_tarballs(&self, pkg: &Package) -> StashResult<Vec<Tarball>> {
        self.record(format!("index {pkg}"));
        self.inner.list_tarballs(pkg)
    }

    fn list_packages(&self) -> StashResult<Vec<Package>> {
        self.inner.list_packages()
    }
}

#[derive(Default)]
struct Gate {
    open: bool,
    entered: usize,
    in_flight: usize,
    max_parallel: usize,
}

/// Store whose index runs block until [`GatedStore::open`] is called.
///
/// A run spans from listing tarballs to persisting the metadata, so the store can report
/// how many runs overlapped.
pub struct GatedStore {
    inner: FileStore,
    gate: Mutex<Gate>,
    changed: Condvar,
}

impl GatedStore {
    pub fn new(inner: FileStore) -> Self {
        Self {
            inner,
            gate: Mutex::new(Gate::default()),
            changed: Condvar::new(),
        }
    }

    pub fn open(&self) {
        self.gate.lock().unwrap().open = true;
        self.changed.notify_all();
    }

    pub fn wait_until_entered(&self) {
        let gate = self.gate.lock().unwrap();
        let _gate = self.changed.wait_while(gate, |g| g.entered == 0).unwrap();
    }

    pub fn runs(&self) -> usize {
        self.gate.lock().unwrap().entered
    }

    pub fn max_parallel(&self) -> usize {
        self.gate.lock().unwrap().max_parallel
    }
}

impl Store for GatedStore {
    fn put_tarball(&self, tarball: &Tarball, bytes: &[u8]) -> StashResult<()> {
        self.inner.put_tarball(tarball, bytes)
    }

    fn get_tarball(&self, tarball: &Tarball) -> StashResult<Vec<u8>> {
        self.inner.get_tarball(tarball)
    }

    fn has_tarball(&self, tarball: &Tarball) -> bool {
        self.inner.has_tarball(tarball)
    }

    fn put_packument(&self, pkg: &Package, bytes: &[u8]) -> StashResult<()> {
        let result = self.inner.put_packument(pkg, bytes);
        self.gate.lock().unwrap().in_flight -= 1;
        result
    }

    fn get_packument_raw(&self, pkg: &Package) -> StashResult<Vec<u8>> {
        self.inner.get_packument_raw(pkg)
    }

    fn list_tarballs(&self, pkg: &Package) -> StashResult<Vec<Tarball>> {
        {
            let mut gate = self.gate.lock().unwrap();
            gate.entered += 1;
            gate.in_flight += 1;
            gate.max_parallel = gate.max_parallel.max(gate.in_flight);
            self.changed.notify_all();
            let _gate = self.changed.wait_while(gate, |g| !g.open).unwrap();
        }
        self.inner.list_tarballs(pkg)
    }

    fn list_packages(&self) -> StashResult<Vec<Package>> {
        self.inner.list_packages()
    }
}
