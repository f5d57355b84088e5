use std::sync::{
    atomic::{AtomicU32, Ordering},
    Mutex,
};

use rayon::{
    iter::{IntoParallelRefIterator, ParallelIterator},
    ThreadPoolBuilder,
};
use stash_core::{StashError, StashResult};
use stash_events::StashEvent;
use tracing::debug;

use crate::{
    index::index_package, BulkReport, FailedInfo, IndexMode, IndexOutcome, IndexedInfo,
    StashContext,
};

/// Reindexes every package in the store with at most `workers` packages in flight.
///
/// `workers` defaults to the configured `index_workers`. A failing package does not stop the
/// others; check [`BulkReport::is_success`] for the overall result. Emits
/// `StashEvent::BatchProgress` once per finished package.
pub fn reindex_all(ctx: &StashContext, workers: Option<usize>) -> StashResult<BulkReport> {
    let packages = ctx.store().list_packages()?;
    let workers = workers.unwrap_or_else(|| ctx.config().index_workers()).max(1);
    debug!(count = packages.len(), workers, "reindexing all packages");

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("stash-index-{i}"))
        .build()
        .map_err(|err| StashError::Custom(format!("failed to build index pool: {err}")))?;

    let total = packages.len() as u32;
    let completed = AtomicU32::new(0);
    let failed_count = AtomicU32::new(0);
    let indexed = Mutex::new(Vec::new());
    let failed = Mutex::new(Vec::new());

    pool.install(|| {
        packages.par_iter().for_each(|pkg| {
            match index_package(ctx, pkg, IndexMode::Sync) {
                Ok(IndexOutcome::Completed(result)) => {
                    let info = IndexedInfo {
                        package: pkg.clone(),
                        versions: result.packument.versions.len(),
                        added: result.added.len(),
                        removed: result.removed.len(),
                        skipped: result.skipped.len(),
                    };
                    indexed
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(info);
                }
                Ok(IndexOutcome::Accepted) => {}
                Err(err) => {
                    failed_count.fetch_add(1, Ordering::Relaxed);
                    failed
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(FailedInfo {
                            package: pkg.clone(),
                            error: err.to_string(),
                        });
                }
            }

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            ctx.emit(StashEvent::BatchProgress {
                completed: done,
                total,
                failed: failed_count.load(Ordering::Relaxed),
            });
        });
    });

    let mut indexed = indexed.into_inner().unwrap_or_else(|e| e.into_inner());
    let mut failed = failed.into_inner().unwrap_or_else(|e| e.into_inner());
    indexed.sort_by(|a, b| a.package.cmp(&b.package));
    failed.sort_by(|a, b| a.package.cmp(&b.package));

    Ok(BulkReport {
        indexed,
        failed,
    })
}
