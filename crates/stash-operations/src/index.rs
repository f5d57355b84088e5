use std::thread;

use stash_core::{reconcile, IndexPermit, Package, Reconciliation, StashError, StashResult};
use stash_events::StashEvent;
use tracing::{debug, error};

use crate::{IndexMode, IndexOutcome, StashContext};

/// Reindexes `pkg` unless it is already being indexed.
///
/// In [`IndexMode::Async`] the package stays marked as busy until the background run ends.
///
/// # Errors
///
/// [`StashError::AlreadyInProgress`] if another index of `pkg` is running; in sync mode
/// also any fatal reconciliation error.
pub fn index_package(
    ctx: &StashContext,
    pkg: &Package,
    mode: IndexMode,
) -> StashResult<IndexOutcome> {
    let permit = acquire(ctx, pkg)?;

    match mode {
        IndexMode::Sync => run(ctx, permit).map(IndexOutcome::Completed),
        IndexMode::Async => {
            let ctx = ctx.clone();
            thread::Builder::new()
                .name(format!("stash-index-{}", pkg.name()))
                .spawn(move || {
                    let _ = run(&ctx, permit);
                })
                .map_err(|err| StashError::Custom(format!("failed to spawn index thread: {err}")))?;
            debug!(pkg = %pkg, "index scheduled");
            Ok(IndexOutcome::Accepted)
        }
    }
}

pub(crate) fn acquire(ctx: &StashContext, pkg: &Package) -> StashResult<IndexPermit> {
    ctx.guard().acquire(pkg).inspect_err(|_| {
        ctx.emit(StashEvent::IndexRejected {
            package: pkg.to_string(),
        });
    })
}

/// Runs the engine for the permit's package; the permit is released on return.
pub(crate) fn run(ctx: &StashContext, permit: IndexPermit) -> StashResult<Reconciliation> {
    let pkg = permit.package();
    ctx.emit(StashEvent::IndexStarted {
        package: pkg.to_string(),
    });

    match reconcile(ctx.store(), pkg) {
        Ok(result) => {
            ctx.emit(StashEvent::IndexCompleted {
                package: pkg.to_string(),
                added: result.added.len(),
                removed: result.removed.len(),
                skipped: result.skipped.len(),
            });
            Ok(result)
        }
        Err(err) => {
            error!(pkg = %pkg, "error indexing package: {err}");
            ctx.emit(StashEvent::IndexFailed {
                package: pkg.to_string(),
                error: err.to_string(),
            });
            Err(err)
        }
    }
}
