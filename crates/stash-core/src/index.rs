//! Rebuilds package metadata from the tarballs present in a store.
//!
//! The tarball set is authoritative: versions whose tarball vanished are pruned, tarballs
//! not yet described are opened and their manifest added. Tarballs that are already
//! indexed are never read again, so reindexing an unchanged package does no archive work.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::{
    archive::extract_manifest,
    error::StashResult,
    package::{Package, Tarball},
    packument::{version_document, Packument},
    store::Store,
};

/// Outcome of reconciling one package.
#[derive(Clone, Debug, Default)]
pub struct Reconciliation {
    pub packument: Packument,
    /// Versions added from newly seen tarballs.
    pub added: Vec<String>,
    /// Versions dropped because their tarball is gone.
    pub removed: Vec<String>,
    /// Tarballs that could not be read or parsed, or whose manifest version differs from
    /// the one in their filename.
    pub skipped: Vec<Tarball>,
}

/// Reconciles the stored metadata of `pkg` with its tarballs and persists the result.
///
/// Per-tarball failures are logged and reported in [`Reconciliation::skipped`]; only a
/// failure to load the existing metadata or to persist the new one is returned as an error.
///
/// A well-formed tarball is also skipped when the `version` in its manifest differs from the
/// version derived from its filename. Versions are keyed by filename for pruning, so adding
/// such an entry under the manifest version would drop it and add it back on every run.
pub fn reconcile(store: &dyn Store, pkg: &Package) -> StashResult<Reconciliation> {
    let tarballs = store.list_tarballs(pkg)?;

    let (mut packument, removed) = match store.get_packument_raw(pkg) {
        Ok(bytes) => {
            let mut packument = Packument::from_slice(&bytes)?;
            let removed = packument.prune_versions(&tarballs);
            (packument, removed)
        }
        Err(err) if err.is_not_found() => {
            debug!(pkg = %pkg, "no metadata yet, starting fresh");
            (
                Packument::new("", &pkg.npm_name(), BTreeMap::new()),
                Vec::new(),
            )
        }
        Err(err) => return Err(err),
    };

    let known: HashSet<&String> = packument.versions.keys().collect();
    let pending: Vec<Tarball> = tarballs
        .into_iter()
        .filter(|tarball| !known.contains(&tarball.version()))
        .collect();
    debug!(pkg = %pkg, pending = pending.len(), "unindexed tarballs");

    let mut added = Vec::new();
    let mut skipped = Vec::new();

    for tarball in pending {
        match load_version(store, &tarball) {
            Ok((version, doc)) => {
                packument.insert_version(version.clone(), doc);
                added.push(version);
            }
            Err(reason) => {
                warn!(tarball = %tarball, %reason, "skipping tarball");
                skipped.push(tarball);
            }
        }
    }

    let bytes = packument.to_json()?;
    store.put_packument(pkg, &bytes)?;

    info!(
        pkg = %pkg,
        added = added.len(),
        removed = removed.len(),
        skipped = skipped.len(),
        latest = packument.latest(),
        "indexed"
    );

    Ok(Reconciliation {
        packument,
        added,
        removed,
        skipped,
    })
}

/// Reconciles `pkg` and returns only the resulting metadata.
pub fn index(store: &dyn Store, pkg: &Package) -> StashResult<Packument> {
    reconcile(store, pkg).map(|r| r.packument)
}

fn load_version(
    store: &dyn Store,
    tarball: &Tarball,
) -> Result<(String, serde_json::Value), String> {
    let expected = tarball.version();
    if expected.is_empty() {
        return Err("filename does not encode a version".to_string());
    }

    let data = store.get_tarball(tarball).map_err(|e| e.to_string())?;
    let manifest = extract_manifest(&data).map_err(|e| e.to_string())?;
    let (version, doc) = version_document(tarball, &manifest).map_err(|e| e.to_string())?;

    // A key that no filename derives would be pruned again on the next run.
    if version != expected {
        return Err(format!(
            "manifest version {version} does not match filename version {expected}"
        ));
    }

    Ok((version, doc))
}
