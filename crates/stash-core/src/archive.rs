//! Reading the embedded manifest out of npm tarballs.

use std::io::Read;

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::trace;

use crate::error::{StashError, StashResult};

/// Manifest location inside a tarball, one directory below the archive root.
const MANIFEST_GLOB: &str = "*/package.json";

/// Upper bound on the size of a manifest entry.
const MAX_MANIFEST_SIZE: u64 = 4 * 1024 * 1024;

/// Returns the bytes of the first `*/package.json` entry of a gzipped tarball.
///
/// # Errors
///
/// [`StashError::Parse`] if the input is empty, the gzip or tar framing is broken, or the
/// archive ends without a manifest, or the manifest header claims more than 4 MiB.
pub fn extract_manifest(tgz: &[u8]) -> StashResult<Vec<u8>> {
    if tgz.is_empty() {
        return Err(StashError::Parse("empty tarball".to_string()));
    }

    let mut archive = Archive::new(GzDecoder::new(tgz));
    let entries = archive.entries().map_err(invalid_archive)?;

    for entry in entries {
        let mut entry = entry.map_err(invalid_archive)?;
        let path = entry
            .path()
            .map_err(invalid_archive)?
            .to_string_lossy()
            .into_owned();

        if !entry.header().entry_type().is_file() || !fast_glob::glob_match(MANIFEST_GLOB, &path) {
            continue;
        }

        let size = entry.size();
        if size > MAX_MANIFEST_SIZE {
            return Err(StashError::Parse(format!(
                "manifest {path} is {size} bytes, limit is {MAX_MANIFEST_SIZE}"
            )));
        }

        trace!(entry = %path, size, "found manifest");
        let mut manifest = Vec::with_capacity(size as usize);
        entry
            .take(MAX_MANIFEST_SIZE)
            .read_to_end(&mut manifest)
            .map_err(invalid_archive)?;
        return Ok(manifest);
    }

    Err(StashError::Parse("no package.json in tarball".to_string()))
}

fn invalid_archive(err: std::io::Error) -> StashError {
    StashError::Parse(format!("invalid tarball: {err}"))
}
