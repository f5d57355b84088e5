//! Registry metadata document for a single package.

use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{ser::PrettyFormatter, Map, Serializer, Value};
use tracing::trace;

use crate::{
    error::{StashError, StashResult},
    package::Tarball,
};

pub const LATEST_TAG: &str = "latest";

/// The metadata document a registry serves for a package.
///
/// Version descriptors are kept as opaque JSON; only `dist.tarball` is ever rewritten.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Packument {
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub versions: BTreeMap<String, Value>,
}

impl Packument {
    pub fn new(latest: &str, name: &str, versions: BTreeMap<String, Value>) -> Self {
        let mut dist_tags = BTreeMap::new();
        dist_tags.insert(LATEST_TAG.to_string(), latest.to_string());
        Self {
            dist_tags,
            name: name.to_string(),
            versions,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> StashResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|err| StashError::Parse(format!("invalid package metadata: {err}")))
    }

    pub fn latest(&self) -> &str {
        self.dist_tags.get(LATEST_TAG).map(String::as_str).unwrap_or("")
    }

    /// Adds the manifest of `tarball` under its `version` field and points its
    /// `dist.tarball` at the tarball's canonical URL.
    ///
    /// Returns the version that was added.
    pub fn add_version(&mut self, tarball: &Tarball, manifest: &[u8]) -> StashResult<String> {
        let (version, doc) = version_document(tarball, manifest)?;
        self.insert_version(version.clone(), doc);
        Ok(version)
    }

    pub fn insert_version(&mut self, version: String, doc: Value) {
        trace!(version = %version, "adding version");
        self.versions.insert(version, doc);
        self.recompute_latest();
    }

    /// Drops every version that has no matching tarball in `present`.
    ///
    /// Returns the removed versions.
    pub fn prune_versions(&mut self, present: &[Tarball]) -> Vec<String> {
        let mut removed = Vec::new();
        self.versions.retain(|version, _| {
            let keep = present.iter().any(|tarball| tarball.version() == *version);
            if !keep {
                removed.push(version.clone());
            }
            keep
        });
        self.recompute_latest();
        removed
    }

    pub fn recompute_latest(&mut self) {
        let latest = latest_stable_version(self.versions.keys());
        self.dist_tags.insert(LATEST_TAG.to_string(), latest);
    }

    /// Serializes the document as JSON indented with three spaces.
    pub fn to_json(&self) -> StashResult<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"   ");
        let mut serializer = Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }
}

/// Parses a tarball manifest into its version and descriptor, with `dist.tarball` set.
pub fn version_document(tarball: &Tarball, manifest: &[u8]) -> StashResult<(String, Value)> {
    let mut doc: Value = serde_json::from_slice(manifest)
        .map_err(|err| StashError::Parse(format!("invalid package.json in {tarball}: {err}")))?;

    let fields = doc.as_object_mut().ok_or_else(|| {
        StashError::Parse(format!("package.json in {tarball} is not an object"))
    })?;

    let version = fields
        .get("version")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| StashError::Parse(format!("package.json in {tarball} has no version")))?;

    let dist = fields
        .entry("dist")
        .or_insert_with(|| Value::Object(Map::new()));
    if !dist.is_object() {
        *dist = Value::Object(Map::new());
    }
    if let Value::Object(dist) = dist {
        dist.insert("tarball".to_string(), Value::String(tarball.remote_url()));
    }

    Ok((version, doc))
}

/// Returns the highest stable version among `versions`, or an empty string.
///
/// Unparseable entries and pre-releases are ignored. The original spelling of the winning
/// key is returned.
pub fn latest_stable_version<I, S>(versions: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    versions
        .into_iter()
        .filter_map(|raw| {
            let parsed = Version::parse(raw.as_ref()).ok()?;
            parsed
                .pre
                .is_empty()
                .then(|| (raw.as_ref().to_string(), parsed))
        })
        .max_by(|(_, a), (_, b)| a.cmp_precedence(b))
        .map(|(raw, _)| raw)
        .unwrap_or_default()
}
