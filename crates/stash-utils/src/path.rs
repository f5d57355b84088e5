use std::{env, path::PathBuf};

use crate::error::{PathError, PathResult};

/// Resolves a configured path string into an absolute path.
///
/// `$VAR` and `${VAR}` are expanded, a leading `~` becomes the home directory, and relative
/// results are joined onto the current directory. `$HOME` falls back to the temp dir and
/// `$XDG_CONFIG_HOME` to `$HOME/.config` when unset.
///
/// # Errors
///
/// * [`PathError::Empty`] if the path is blank
/// * [`PathError::MissingEnvVar`] if a referenced variable is undefined
/// * [`PathError::UnclosedVariable`] if a `${` expression is never closed
/// * [`PathError::CurrentDir`] if a relative path cannot be anchored
///
/// # Example
///
/// ```
/// use stash_utils::path::resolve_path;
///
/// let storage = resolve_path("$HOME/npm-store").unwrap();
/// assert!(storage.is_absolute());
/// ```
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let expanded = PathBuf::from(expand(path)?);
    if expanded.is_absolute() {
        return Ok(expanded);
    }

    env::current_dir()
        .map(|cwd| cwd.join(expanded))
        .map_err(|source| {
            PathError::CurrentDir {
                source,
            }
        })
}

/// `$XDG_CONFIG_HOME`, defaulting to `$HOME/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
}

fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
}

fn lookup(var: &str, input: &str) -> PathResult<String> {
    match var {
        "HOME" => Ok(home_dir().to_string_lossy().into_owned()),
        "XDG_CONFIG_HOME" => Ok(xdg_config_home().to_string_lossy().into_owned()),
        _ => {
            env::var(var).map_err(|_| {
                PathError::MissingEnvVar {
                    var: var.to_string(),
                    input: input.to_string(),
                }
            })
        }
    }
}

fn expand(input: &str) -> PathResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    if let Some(tail) = rest.strip_prefix('~') {
        out.push_str(&home_dir().to_string_lossy());
        rest = tail;
    }

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| {
                PathError::UnclosedVariable {
                    input: format!("${{{braced}"),
                }
            })?;
            out.push_str(&lookup(&braced[..end], input)?);
            rest = &braced[end + 1..];
        } else {
            let len = after
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if len == 0 {
                out.push('$');
            } else {
                out.push_str(&lookup(&after[..len], input)?);
            }
            rest = &after[len..];
        }
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_expand_plain_and_braced() {
        env::set_var("STASH_TEST_STORE", "/srv/npm");
        assert_eq!(expand("$STASH_TEST_STORE/tarballs").unwrap(), "/srv/npm/tarballs");
        assert_eq!(expand("${STASH_TEST_STORE}_meta").unwrap(), "/srv/npm_meta");
        env::remove_var("STASH_TEST_STORE");
    }

    #[test]
    #[serial]
    fn test_expand_missing_variable() {
        env::remove_var("STASH_SURELY_UNSET");
        assert!(matches!(
            expand("$STASH_SURELY_UNSET/store"),
            Err(PathError::MissingEnvVar { ref var, .. }) if var == "STASH_SURELY_UNSET"
        ));
    }

    #[test]
    fn test_expand_unclosed() {
        assert!(matches!(
            expand("/srv/${HOME"),
            Err(PathError::UnclosedVariable { ref input }) if input == "${HOME"
        ));
    }

    #[test]
    fn test_lone_dollar_is_kept() {
        assert_eq!(expand("a$/b$").unwrap(), "a$/b$");
    }

    #[test]
    #[serial]
    fn test_tilde_expansion() {
        let previous = env::var("HOME").ok();
        env::set_var("HOME", "/home/stash");
        assert_eq!(
            resolve_path("~/registry").unwrap(),
            PathBuf::from("/home/stash/registry")
        );
        assert_eq!(expand("/srv/~cache").unwrap(), "/srv/~cache");
        match previous {
            Some(home) => env::set_var("HOME", home),
            None => env::remove_var("HOME"),
        }
    }

    #[test]
    #[serial]
    fn test_xdg_config_home_fallback() {
        let previous = env::var("XDG_CONFIG_HOME").ok();
        env::remove_var("XDG_CONFIG_HOME");
        assert_eq!(xdg_config_home(), home_dir().join(".config"));
        if let Some(value) = previous {
            env::set_var("XDG_CONFIG_HOME", value);
        }
    }

    #[test]
    fn test_resolve_relative_path() {
        let resolved = resolve_path("store").unwrap();
        assert_eq!(resolved, env::current_dir().unwrap().join("store"));
    }

    #[test]
    fn test_resolve_empty_path() {
        assert!(matches!(resolve_path("   "), Err(PathError::Empty)));
    }
}
