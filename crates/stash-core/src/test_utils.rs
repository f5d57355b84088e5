use std::io::Write;

use flate2::{write::GzEncoder, Compression};

/// Builds a gzipped tarball from `(path, contents)` pairs.
pub fn build_tgz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *contents).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// A tarball laid out the way `npm pack` does, with a minimal manifest.
pub fn npm_tarball(name: &str, version: &str) -> Vec<u8> {
    let manifest = format!(r#"{{"name":"{name}","version":"{version}","main":"index.js"}}"#);
    build_tgz(&[
        ("package/package.json", manifest.as_bytes()),
        ("package/index.js", b"module.exports = {};".as_slice()),
    ])
}

/// A tarball whose manifest header claims an exabyte-scale size in GNU base-256 encoding.
pub fn oversized_manifest_tarball() -> Vec<u8> {
    let mut header = tar::Header::new_gnu();
    header.set_path("package/package.json").unwrap();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(0x0fff_ffff_ffff_ffff);
    header.set_mode(0o644);
    header.set_cksum();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(header.as_bytes()).unwrap();
    encoder.write_all(br#"{"version":"1.0.0"}"#).unwrap();
    encoder.write_all(&[0u8; 1024]).unwrap();
    encoder.finish().unwrap()
}
