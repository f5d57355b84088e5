//! On-disk persistence for tarballs and package metadata.
//!
//! Two trees are kept, which may share a root:
//!
//! ```text
//! <tarball_root>/<registry>/[<scope>/]<name>/<name>-<version>.tgz
//! <metadata_root>/<registry>/[<scope>/]<name>/metadata.json
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use stash_utils::fs::write_atomic;
use tracing::{debug, trace};

use crate::{
    error::{ErrorContext, StashResult},
    package::{is_tarball_filename, Package, Tarball},
};

pub const METADATA_FILE: &str = "metadata.json";

/// Storage backend for tarballs and package metadata.
pub trait Store: Send + Sync {
    fn put_tarball(&self, tarball: &Tarball, bytes: &[u8]) -> StashResult<()>;

    /// Fails with [`crate::StashError::NotFound`] when the tarball is absent.
    fn get_tarball(&self, tarball: &Tarball) -> StashResult<Vec<u8>>;

    fn has_tarball(&self, tarball: &Tarball) -> bool;

    fn put_packument(&self, pkg: &Package, bytes: &[u8]) -> StashResult<()>;

    /// Fails with [`crate::StashError::NotFound`] when no metadata has been written yet.
    fn get_packument_raw(&self, pkg: &Package) -> StashResult<Vec<u8>>;

    /// Tarballs stored for `pkg`, sorted by filename. Empty when the package is unknown.
    fn list_tarballs(&self, pkg: &Package) -> StashResult<Vec<Tarball>>;

    /// Every package directory in the tarball tree, sorted.
    fn list_packages(&self) -> StashResult<Vec<Package>>;
}

/// [`Store`] backed by the local filesystem.
#[derive(Clone, Debug)]
pub struct FileStore {
    tarball_root: PathBuf,
    metadata_root: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(tarball_root: P, metadata_root: Q) -> Self {
        Self {
            tarball_root: tarball_root.into(),
            metadata_root: metadata_root.into(),
        }
    }

    pub fn tarball_root(&self) -> &Path {
        &self.tarball_root
    }

    pub fn metadata_root(&self) -> &Path {
        &self.metadata_root
    }

    pub fn tarball_path(&self, tarball: &Tarball) -> PathBuf {
        self.tarball_root.join(tarball.to_path())
    }

    pub fn packument_path(&self, pkg: &Package) -> PathBuf {
        self.metadata_root.join(pkg.to_path()).join(METADATA_FILE)
    }
}

impl Store for FileStore {
    fn put_tarball(&self, tarball: &Tarball, bytes: &[u8]) -> StashResult<()> {
        let path = self.tarball_path(tarball);
        trace!(path = %path.display(), bytes = bytes.len(), "writing tarball");
        write_atomic(&path, bytes)?;
        Ok(())
    }

    fn get_tarball(&self, tarball: &Tarball) -> StashResult<Vec<u8>> {
        let path = self.tarball_path(tarball);
        fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }

    fn has_tarball(&self, tarball: &Tarball) -> bool {
        self.tarball_path(tarball).is_file()
    }

    fn put_packument(&self, pkg: &Package, bytes: &[u8]) -> StashResult<()> {
        let path = self.packument_path(pkg);
        trace!(path = %path.display(), "writing package metadata");
        write_atomic(&path, bytes)?;
        Ok(())
    }

    fn get_packument_raw(&self, pkg: &Package) -> StashResult<Vec<u8>> {
        let path = self.packument_path(pkg);
        fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }

    fn list_tarballs(&self, pkg: &Package) -> StashResult<Vec<Tarball>> {
        let dir = self.tarball_root.join(pkg.to_path());
        let mut tarballs = Vec::new();

        for entry in read_dir_or_empty(&dir)? {
            let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !is_tarball_filename(name) {
                continue;
            }
            if entry.path().is_file() {
                tarballs.push(pkg.tarball(name));
            }
        }

        tarballs.sort();
        debug!(pkg = %pkg, count = tarballs.len(), "listed tarballs");
        Ok(tarballs)
    }

    fn list_packages(&self) -> StashResult<Vec<Package>> {
        let mut packages = Vec::new();

        for registry in subdirectories(&self.tarball_root)? {
            let registry_dir = self.tarball_root.join(&registry);
            for child in subdirectories(&registry_dir)? {
                if child.starts_with('@') {
                    for name in subdirectories(&registry_dir.join(&child))? {
                        packages.push(Package::new(&registry, &child, &name));
                    }
                } else {
                    packages.push(Package::new(&registry, "", &child));
                }
            }
        }

        packages.sort();
        debug!(count = packages.len(), "listed packages");
        Ok(packages)
    }
}

type DirEntries = Box<dyn Iterator<Item = std::io::Result<fs::DirEntry>>>;

/// `read_dir` that yields nothing for a missing directory.
fn read_dir_or_empty(dir: &Path) -> StashResult<DirEntries> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(Box::new(entries)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Ok(Box::new(std::iter::empty()))
        }
        Err(err) => Err(err).with_context(|| format!("reading {}", dir.display())),
    }
}

/// Names of the UTF-8 named directories directly below `dir`.
fn subdirectories(dir: &Path) -> StashResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in read_dir_or_empty(dir)? {
        let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}
