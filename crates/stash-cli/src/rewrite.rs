//! Rewriting of `dist.tarball` URLs in locally served metadata.

use serde_json::Value;
use stash_core::{Package, StashError, StashResult};

/// Tarball URL template with `{registry}`, `{scope}`, `{name}` and `{filename}` placeholders.
///
/// For unscoped packages `{scope}` renders empty and takes one adjacent slash with it, so
/// `http://mirror/{scope}/{name}/-/{filename}` works for both kinds of packages.
#[derive(Clone, Debug)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new<S: Into<String>>(template: S) -> Self {
        Self(template.into())
    }

    pub fn render(&self, pkg: &Package, filename: &str) -> String {
        let mut out = self.0.clone();
        if pkg.scope().is_empty() {
            out = out.replace("/{scope}/", "/").replace("{scope}/", "");
        }
        out.replace("{registry}", pkg.registry())
            .replace("{scope}", pkg.scope())
            .replace("{name}", pkg.name())
            .replace("{filename}", filename)
    }
}

/// Renders `template` into the `dist.tarball` of every version in the document `data`.
pub fn rewrite_tarball_urls(data: &[u8], pkg: &Package, template: &UrlTemplate) -> StashResult<Vec<u8>> {
    let mut doc: Value = serde_json::from_slice(data)
        .map_err(|err| StashError::Parse(format!("invalid package metadata: {err}")))?;

    if let Some(versions) = doc.get_mut("versions").and_then(Value::as_object_mut) {
        for (version, manifest) in versions.iter_mut() {
            let Some(dist) = manifest.get_mut("dist").and_then(Value::as_object_mut) else {
                continue;
            };

            let filename = dist
                .get("tarball")
                .and_then(Value::as_str)
                .and_then(url_filename)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}-{version}.tgz", pkg.name()));
            dist.insert(
                "tarball".to_string(),
                Value::String(template.render(pkg, &filename)),
            );
        }
    }

    Ok(serde_json::to_vec(&doc)?)
}

fn url_filename(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}
