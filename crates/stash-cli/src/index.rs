use nu_ansi_term::Color::{Blue, Cyan, Green, Red, Yellow};
use stash_core::{Package, StashError, StashResult};
use stash_operations::{
    bulk::reindex_all, index::index_package, BulkReport, IndexMode, IndexOutcome, StashContext,
};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::{info, warn};

use crate::utils::Colored;

/// Reindexes the package named by `uri` (`registry/[scope/]name`).
pub fn index_one(ctx: &StashContext, uri: &str) -> StashResult<()> {
    let pkg = Package::from_uri(uri)?;

    match index_package(ctx, &pkg, IndexMode::Sync)? {
        IndexOutcome::Completed(result) => {
            info!(
                "Indexed {}: {} versions, latest {} (+{} -{})",
                Colored(Blue, &pkg),
                result.packument.versions.len(),
                Colored(Green, result.packument.latest()),
                result.added.len(),
                result.removed.len()
            );
            for tarball in &result.skipped {
                warn!("Skipped {}", Colored(Yellow, tarball));
            }
        }
        IndexOutcome::Accepted => info!("Indexing {} in the background", Colored(Blue, &pkg)),
    }

    Ok(())
}

/// Reindexes the whole store and prints a summary.
///
/// Fails when any package failed, after every package has been tried.
pub fn index_all(ctx: &StashContext, workers: Option<usize>) -> StashResult<()> {
    let report = reindex_all(ctx, workers)?;
    print_summary(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(StashError::Custom(format!(
            "{} of {} packages failed to index",
            report.failed.len(),
            report.total()
        )))
    }
}

fn print_summary(report: &BulkReport) {
    for failed in &report.failed {
        warn!("{}: {}", Colored(Red, &failed.package), failed.error);
    }

    let versions: usize = report.indexed.iter().map(|info| info.versions).sum();
    let added: usize = report.indexed.iter().map(|info| info.added).sum();
    let removed: usize = report.indexed.iter().map(|info| info.removed).sum();
    let skipped: usize = report.indexed.iter().map(|info| info.skipped).sum();

    let mut builder = Builder::new();
    builder.push_record([
        "Indexed".to_string(),
        format!("{}", Colored(Green, report.indexed.len())),
    ]);
    builder.push_record([
        "Failed".to_string(),
        if report.failed.is_empty() {
            "0".to_string()
        } else {
            format!("{}", Colored(Red, report.failed.len()))
        },
    ]);
    builder.push_record(["Versions".to_string(), format!("{}", Colored(Cyan, versions))]);
    builder.push_record(["Added".to_string(), added.to_string()]);
    builder.push_record(["Removed".to_string(), removed.to_string()]);
    builder.push_record(["Skipped tarballs".to_string(), skipped.to_string()]);

    let table = builder
        .build()
        .with(Panel::header("Index Summary"))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();

    info!("\n{table}");
}
