//! Package and tarball coordinates.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

use url::Url;

use crate::error::{StashError, StashResult};

/// Identity of a package on a registry.
///
/// `scope` keeps its leading `@` and is empty for unscoped packages.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Package {
    registry: String,
    scope: String,
    name: String,
}

impl Package {
    /// Creates a package coordinate, reducing a URL-form registry to its host.
    ///
    /// # Examples
    ///
    /// ```
    /// use stash_core::Package;
    ///
    /// let pkg = Package::new("https://registry.npmjs.org/", "@babel", "parser");
    /// assert_eq!(pkg.registry(), "registry.npmjs.org");
    /// assert_eq!(pkg.to_string(), "registry.npmjs.org/@babel/parser");
    /// ```
    pub fn new(registry: &str, scope: &str, name: &str) -> Self {
        Self {
            registry: normalize_registry(registry),
            scope: scope.to_string(),
            name: name.to_string(),
        }
    }

    /// Parses a relative path of the form `registry/name` or `registry/scope/name`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> StashResult<Self> {
        let path = path.as_ref();
        let segments = path_segments(path)?;

        match segments.as_slice() {
            [registry, name] => Ok(Self::new(registry, "", name)),
            [registry, scope, name] => Ok(Self::new(registry, scope, name)),
            _ => {
                Err(StashError::Parse(format!(
                    "expected registry/[scope/]name, got '{}'",
                    path.display()
                )))
            }
        }
    }

    /// Parses a `registry/[scope/]name` string, ignoring leading and trailing slashes.
    pub fn from_uri(uri: &str) -> StashResult<Self> {
        let segments: Vec<&str> = uri.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [registry, name] => Ok(Self::new(registry, "", name)),
            [registry, scope, name] => Ok(Self::new(registry, scope, name)),
            _ => {
                Err(StashError::Parse(format!(
                    "expected registry/[scope/]name, got '{uri}'"
                )))
            }
        }
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_scoped(&self) -> bool {
        !self.scope.is_empty()
    }

    /// The name as npm spells it: `@scope/name` or `name`.
    pub fn npm_name(&self) -> String {
        if self.is_scoped() {
            format!("{}/{}", self.scope, self.name)
        } else {
            self.name.clone()
        }
    }

    /// Relative directory of this package inside a store tree.
    pub fn to_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.registry);
        if self.is_scoped() {
            path.push(&self.scope);
        }
        path.push(&self.name);
        path
    }

    /// URL of the package document on the remote registry.
    pub fn remote_url(&self) -> String {
        if self.is_scoped() {
            format!("https://{}/{}%2f{}", self.registry, self.scope, self.name)
        } else {
            format!("https://{}/{}", self.registry, self.name)
        }
    }

    pub fn tarball(&self, filename: &str) -> Tarball {
        Tarball::new(self.clone(), filename)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scoped() {
            write!(f, "{}/{}/{}", self.registry, self.scope, self.name)
        } else {
            write!(f, "{}/{}", self.registry, self.name)
        }
    }
}

/// A tarball file belonging to a package.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tarball {
    package: Package,
    filename: String,
}

impl Tarball {
    pub fn new(package: Package, filename: &str) -> Self {
        Self {
            package,
            filename: filename.to_string(),
        }
    }

    /// Parses a relative path of the form `registry/[scope/]name/filename`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> StashResult<Self> {
        let path = path.as_ref();
        let segments = path_segments(path)?;

        match segments.as_slice() {
            [registry, name, filename] => {
                Ok(Self::new(Package::new(registry, "", name), filename))
            }
            [registry, scope, name, filename] => {
                Ok(Self::new(Package::new(registry, scope, name), filename))
            }
            _ => {
                Err(StashError::Parse(format!(
                    "expected registry/[scope/]name/filename, got '{}'",
                    path.display()
                )))
            }
        }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Version encoded in the filename, or an empty string when it cannot be derived.
    pub fn version(&self) -> String {
        derive_version(self.package.name(), &self.filename)
    }

    /// Relative path of this tarball inside the tarball tree.
    pub fn to_path(&self) -> PathBuf {
        self.package.to_path().join(&self.filename)
    }

    /// Canonical download URL: `https://<registry>/[<scope>/]<name>/-/<filename>`.
    pub fn remote_url(&self) -> String {
        let pkg = &self.package;
        if pkg.is_scoped() {
            format!(
                "https://{}/{}/{}/-/{}",
                pkg.registry, pkg.scope, pkg.name, self.filename
            )
        } else {
            format!("https://{}/{}/-/{}", pkg.registry, pkg.name, self.filename)
        }
    }
}

impl fmt::Display for Tarball {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.filename)
    }
}

/// Whether `segment` can be used as a single directory or file name inside the store.
pub fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

/// Whether `filename` names a tarball the store lists: a plain segment matching `*.tgz`.
pub fn is_tarball_filename(filename: &str) -> bool {
    is_path_segment(filename) && fast_glob::glob_match("*.tgz", filename)
}

/// Extracts the version from a `<name>-<version>.tgz` filename.
///
/// A scoped `@scope/name` is accepted and matched on its unscoped part. Returns an empty
/// string when either input is empty or the filename does not follow the convention.
///
/// # Examples
///
/// ```
/// use stash_core::package::derive_version;
///
/// assert_eq!(derive_version("create-x", "create-x-5.0.0-beta.1.tgz"), "5.0.0-beta.1");
/// assert_eq!(derive_version("create-x", "create-x-5.0.0"), "");
/// ```
pub fn derive_version(name: &str, filename: &str) -> String {
    let name = name.rsplit('/').next().unwrap_or(name);
    if name.is_empty() || filename.is_empty() {
        return String::new();
    }

    filename
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(".tgz"))
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Splits a request name into `(scope, name)`: `@scope/name` or `name`.
pub fn split_request_name(name: &str) -> StashResult<(String, String)> {
    let segments: Vec<&str> = name.split('/').collect();

    match segments.as_slice() {
        [name] if !name.is_empty() => Ok((String::new(), name.to_string())),
        [scope, name] if scope.starts_with('@') && scope.len() > 1 && !name.is_empty() => {
            Ok((scope.to_string(), name.to_string()))
        }
        _ => Err(StashError::Parse(format!("invalid package name '{name}'"))),
    }
}

fn path_segments(path: &Path) -> StashResult<Vec<&str>> {
    path.components()
        .filter_map(|component| {
            match component {
                Component::Normal(segment) => Some(segment),
                _ => None,
            }
        })
        .map(|segment| {
            segment.to_str().ok_or_else(|| {
                StashError::Parse(format!("non UTF-8 path segment in '{}'", path.display()))
            })
        })
        .collect()
}

fn normalize_registry(registry: &str) -> String {
    let registry = registry.trim();
    if registry.contains("://") {
        if let Ok(url) = Url::parse(registry) {
            if let Some(host) = url.host_str() {
                return match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
            }
        }
    }
    registry.trim_end_matches('/').to_string()
}
