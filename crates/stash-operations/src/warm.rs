//! Background download of every tarball a proxied package document lists.
//!
//! Warming only stores tarballs; metadata for them is built lazily by the next index.

use std::thread;

use stash_core::{package::is_tarball_filename, Package, Packument, StashResult, Tarball};
use stash_events::StashEvent;
use tracing::{debug, error, info, warn};

use crate::{StashContext, WarmReport};

/// Tarballs listed in `packument` that are not in the store yet.
pub fn missing_tarballs(ctx: &StashContext, pkg: &Package, packument: &Packument) -> Vec<Tarball> {
    let mut missing: Vec<Tarball> = packument
        .versions
        .values()
        .filter_map(|doc| doc.pointer("/dist/tarball").and_then(|url| url.as_str()))
        .filter_map(tarball_filename)
        .map(|filename| pkg.tarball(filename))
        .filter(|tarball| !ctx.store().has_tarball(tarball))
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

/// Downloads every missing tarball of `pkg` listed in the origin document `raw`.
///
/// Individual download failures are reported, not returned.
pub fn warm_missing(ctx: &StashContext, pkg: &Package, raw: &[u8]) -> StashResult<WarmReport> {
    let packument = Packument::from_slice(raw)?;
    let missing = missing_tarballs(ctx, pkg, &packument);

    ctx.emit(StashEvent::WarmStarted {
        package: pkg.to_string(),
        missing: missing.len(),
    });
    info!(pkg = %pkg, missing = missing.len(), "downloading missing tarballs");

    let mut report = WarmReport::default();
    for tarball in missing {
        let url = tarball.remote_url();
        debug!(url = %url, "downloading tarball");

        let result = ctx
            .origin()
            .fetch(&url)
            .map_err(Into::into)
            .and_then(|bytes| ctx.store().put_tarball(&tarball, &bytes));

        match result {
            Ok(()) => {
                ctx.emit(StashEvent::WarmFetched {
                    tarball: tarball.to_string(),
                });
                report.fetched.push(tarball.to_string());
            }
            Err(err) => {
                warn!(url = %url, "failed to download tarball: {err}");
                ctx.emit(StashEvent::WarmFailed {
                    tarball: tarball.to_string(),
                    error: err.to_string(),
                });
                report.failed.push((tarball.to_string(), err.to_string()));
            }
        }
    }

    Ok(report)
}

/// Runs [`warm_missing`] on a background thread.
pub fn spawn_warm(ctx: &StashContext, pkg: &Package, raw: Vec<u8>) {
    let ctx = ctx.clone();
    let pkg = pkg.clone();
    let spawned = thread::Builder::new()
        .name(format!("stash-warm-{}", pkg.name()))
        .spawn(move || {
            if let Err(err) = warm_missing(&ctx, &pkg, &raw) {
                error!(pkg = %pkg, "error while fetching all tarballs: {err}");
            }
        });

    if let Err(err) = spawned {
        error!("failed to spawn warm thread: {err}");
    }
}

/// Last path segment of a tarball URL, without query or fragment.
///
/// Anything that is not a `*.tgz` name the store would list is rejected.
fn tarball_filename(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| is_tarball_filename(name))
}
