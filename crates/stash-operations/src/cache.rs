//! Serve from the store, or fill the store from the origin registry.

use stash_core::{Package, StashError, StashResult, Tarball};
use stash_events::{AssetKind, StashEvent};
use tracing::{debug, info, warn};

use crate::{
    index::{acquire, run},
    warm::spawn_warm,
    Served, StashContext,
};

/// Answers a metadata request for `pkg`.
///
/// With `proxystash` the origin is authoritative and its document is returned unmodified,
/// optionally scheduling a background download of every missing tarball. Otherwise the
/// stored metadata is returned, building it first if the package has tarballs but was never
/// indexed.
pub fn read_metadata(ctx: &StashContext, pkg: &Package) -> StashResult<Served> {
    let served = if ctx.config().proxystash() {
        read_metadata_remote(ctx, pkg)?
    } else {
        read_metadata_local(ctx, pkg)?
    };

    ctx.emit(StashEvent::Served {
        asset: AssetKind::Metadata,
        target: pkg.to_string(),
        source: served.source,
    });
    Ok(served)
}

fn read_metadata_remote(ctx: &StashContext, pkg: &Package) -> StashResult<Served> {
    let url = pkg.remote_url();
    let bytes = ctx.origin().fetch(&url)?;
    ctx.emit(StashEvent::OriginFetched {
        url,
        bytes: bytes.len() as u64,
    });

    if ctx.config().fetch_all() {
        spawn_warm(ctx, pkg, bytes.clone());
    }

    Ok(Served::remote(bytes))
}

fn read_metadata_local(ctx: &StashContext, pkg: &Package) -> StashResult<Served> {
    match ctx.store().get_packument_raw(pkg) {
        Ok(bytes) => return Ok(Served::local(bytes)),
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    let tarballs = ctx.store().list_tarballs(pkg)?;
    if tarballs.is_empty() {
        return Err(StashError::NotFound(pkg.to_string()));
    }

    info!(pkg = %pkg, tarballs = tarballs.len(), "metadata not found, indexing now");
    let permit = acquire(ctx, pkg)?;
    run(ctx, permit)?;

    ctx.store().get_packument_raw(pkg).map(Served::local)
}

/// Answers a tarball request.
///
/// A miss with `proxystash` fetches the tarball, stores it and reindexes its package before
/// returning the bytes, so the new version shows up in locally served metadata.
pub fn read_tarball(ctx: &StashContext, tarball: &Tarball) -> StashResult<Served> {
    let served = match ctx.store().get_tarball(tarball) {
        Ok(bytes) => Served::local(bytes),
        Err(err) if err.is_not_found() && ctx.config().proxystash() => fill_tarball(ctx, tarball)?,
        Err(err) => return Err(err),
    };

    ctx.emit(StashEvent::Served {
        asset: AssetKind::Tarball,
        target: tarball.to_string(),
        source: served.source,
    });
    Ok(served)
}

fn fill_tarball(ctx: &StashContext, tarball: &Tarball) -> StashResult<Served> {
    let url = tarball.remote_url();
    let bytes = ctx.origin().fetch(&url)?;
    ctx.emit(StashEvent::OriginFetched {
        url,
        bytes: bytes.len() as u64,
    });

    ctx.store().put_tarball(tarball, &bytes)?;
    ctx.emit(StashEvent::TarballStored {
        tarball: tarball.to_string(),
    });
    debug!(tarball = %tarball, "stored tarball from origin");

    let pkg = tarball.package();
    match acquire(ctx, pkg) {
        Ok(permit) => {
            run(ctx, permit)?;
        }
        // The tarball is stored; the running index or the next one will pick it up.
        Err(err) if err.is_in_progress() => {
            warn!(pkg = %pkg, "index already running, not reindexing after fill");
        }
        Err(err) => return Err(err),
    }

    Ok(Served::remote(bytes))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use stash_config::config::Config;
    use stash_core::{FileStore, Packument, Store};
    use stash_events::{CollectorSink, ServeSource};
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::{
        npm_tarball, proxystash_config, test_context, test_context_with, CountingOrigin,
        JournalStore,
    };

    #[test]
    fn test_local_metadata_found() {
        let dir = tempdir().unwrap();
        let (ctx, events) = test_context(dir.path(), Config::default_config());
        let pkg = ctx.package("", "react");
        ctx.store().put_packument(&pkg, b"{\"name\":\"react\"}").unwrap();

        let served = read_metadata(&ctx, &pkg).unwrap();
        assert_eq!(served.bytes, b"{\"name\":\"react\"}");
        assert_eq!(served.source, ServeSource::FoundLocally);
        assert_eq!(
            events.events(),
            vec![StashEvent::Served {
                asset: AssetKind::Metadata,
                target: pkg.to_string(),
                source: ServeSource::FoundLocally,
            }]
        );
    }

    #[test]
    fn test_local_metadata_indexed_lazily() {
        let dir = tempdir().unwrap();
        let (ctx, _) = test_context(dir.path(), Config::default_config());
        let pkg = ctx.package("@types", "react");
        ctx.store()
            .put_tarball(&pkg.tarball("react-18.2.0.tgz"), &npm_tarball("@types/react", "18.2.0"))
            .unwrap();

        let served = read_metadata(&ctx, &pkg).unwrap();
        let packument = Packument::from_slice(&served.bytes).unwrap();
        assert_eq!(packument.latest(), "18.2.0");
        assert_eq!(packument.name, "@types/react");
        assert!(!ctx.guard().is_active(&pkg));
    }

    #[test]
    fn test_local_metadata_without_tarballs_is_not_found() {
        let dir = tempdir().unwrap();
        let (ctx, _) = test_context(dir.path(), Config::default_config());
        let pkg = ctx.package("", "left-pad");

        let err = read_metadata(&ctx, &pkg).unwrap_err();
        assert!(err.is_not_found());
        assert!(ctx.store().get_packument_raw(&pkg).is_err());
    }

    #[test]
    fn test_local_metadata_fallback_respects_guard() {
        let dir = tempdir().unwrap();
        let (ctx, _) = test_context(dir.path(), Config::default_config());
        let pkg = ctx.package("", "react");
        ctx.store()
            .put_tarball(&pkg.tarball("react-1.0.0.tgz"), &npm_tarball("react", "1.0.0"))
            .unwrap();

        let _permit = ctx.guard().acquire(&pkg).unwrap();
        assert!(read_metadata(&ctx, &pkg).unwrap_err().is_in_progress());
    }

    #[test]
    fn test_proxied_metadata_is_passed_through() {
        let dir = tempdir().unwrap();
        let origin = Arc::new(CountingOrigin::default().with(
            "https://registry.npmjs.org/@types%2freact",
            b"{\"upstream\":true}".to_vec(),
        ));
        let (ctx, events) = test_context_with(dir.path(), proxystash_config(false), origin.clone());
        let pkg = ctx.package("@types", "react");
        ctx.store().put_packument(&pkg, b"{\"local\":true}").unwrap();

        let served = read_metadata(&ctx, &pkg).unwrap();
        assert_eq!(served.bytes, b"{\"upstream\":true}");
        assert!(served.is_remote());
        assert_eq!(origin.calls(), 1);
        assert!(matches!(
            events.events()[0],
            StashEvent::OriginFetched { bytes: 17, .. }
        ));
    }

    #[test]
    fn test_proxied_metadata_not_found() {
        let dir = tempdir().unwrap();
        let (ctx, _) = test_context(dir.path(), proxystash_config(false));
        let err = read_metadata(&ctx, &ctx.package("", "nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_proxied_metadata_origin_error() {
        let dir = tempdir().unwrap();
        let origin = Arc::new(
            CountingOrigin::default().with_status("https://registry.npmjs.org/react", 503),
        );
        let (ctx, _) = test_context_with(dir.path(), proxystash_config(false), origin);
        let err = read_metadata(&ctx, &ctx.package("", "react")).unwrap_err();
        assert!(matches!(err, StashError::Origin(_)));
    }

    #[test]
    fn test_local_tarball() {
        let dir = tempdir().unwrap();
        let (ctx, _) = test_context(dir.path(), proxystash_config(false));
        let tarball = ctx.package("", "react").tarball("react-1.0.0.tgz");
        ctx.store().put_tarball(&tarball, b"cached").unwrap();

        let served = read_tarball(&ctx, &tarball).unwrap();
        assert_eq!(served.bytes, b"cached");
        assert_eq!(served.source, ServeSource::FoundLocally);
    }

    #[test]
    fn test_tarball_miss_without_proxystash() {
        let dir = tempdir().unwrap();
        let origin = Arc::new(CountingOrigin::default());
        let (ctx, _) = test_context_with(dir.path(), Config::default_config(), origin.clone());
        let tarball = ctx.package("", "react").tarball("react-1.0.0.tgz");

        assert!(read_tarball(&ctx, &tarball).unwrap_err().is_not_found());
        assert_eq!(origin.calls(), 0);
    }

    #[test]
    fn test_tarball_fill_order() {
        let dir = tempdir().unwrap();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let url = "https://registry.npmjs.org/react/-/react-18.2.0.tgz";
        let origin = Arc::new(
            CountingOrigin::journaled(journal.clone()).with(url, npm_tarball("react", "18.2.0")),
        );
        let events = Arc::new(CollectorSink::default());
        let ctx = StashContext::new(
            proxystash_config(false),
            Arc::new(JournalStore::new(
                FileStore::new(dir.path(), dir.path()),
                journal.clone(),
            )),
            origin.clone(),
            events.clone(),
        );
        let tarball = ctx.package("", "react").tarball("react-18.2.0.tgz");

        let served = read_tarball(&ctx, &tarball).unwrap();
        assert_eq!(served.bytes, npm_tarball("react", "18.2.0"));
        assert!(served.is_remote());
        assert_eq!(origin.calls(), 1);

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                format!("fetch {url}"),
                "store registry.npmjs.org/react/react-18.2.0.tgz".to_string(),
                "index registry.npmjs.org/react".to_string(),
            ]
        );

        let kinds: Vec<&str> = events
            .events()
            .iter()
            .map(|e| {
                match e {
                    StashEvent::OriginFetched { .. } => "fetched",
                    StashEvent::TarballStored { .. } => "stored",
                    StashEvent::IndexStarted { .. } => "index-started",
                    StashEvent::IndexCompleted { .. } => "index-completed",
                    StashEvent::Served { .. } => "served",
                    _ => "other",
                }
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["fetched", "stored", "index-started", "index-completed", "served"]
        );

        let packument =
            Packument::from_slice(&ctx.store().get_packument_raw(tarball.package()).unwrap())
                .unwrap();
        assert_eq!(packument.latest(), "18.2.0");
    }

    #[test]
    fn test_tarball_fill_origin_not_found() {
        let dir = tempdir().unwrap();
        let (ctx, _) = test_context(dir.path(), proxystash_config(false));
        let tarball = ctx.package("", "react").tarball("react-0.0.0.tgz");

        assert!(read_tarball(&ctx, &tarball).unwrap_err().is_not_found());
        assert!(!ctx.store().has_tarball(&tarball));
    }

    #[test]
    fn test_tarball_fill_while_indexing_still_serves() {
        let dir = tempdir().unwrap();
        let url = "https://registry.npmjs.org/react/-/react-1.0.0.tgz";
        let origin = Arc::new(CountingOrigin::default().with(url, npm_tarball("react", "1.0.0")));
        let (ctx, _) = test_context_with(dir.path(), proxystash_config(false), origin);
        let tarball = ctx.package("", "react").tarball("react-1.0.0.tgz");

        let _permit = ctx.guard().acquire(tarball.package()).unwrap();
        let served = read_tarball(&ctx, &tarball).unwrap();
        assert!(served.is_remote());
        assert!(ctx.store().has_tarball(&tarball));
    }
}
