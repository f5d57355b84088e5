use std::{fs, io::Write, path::Path};

use tempfile::NamedTempFile;

use crate::error::{FileSystemError, FileSystemResult, WriteStep};

/// Creates `path` and its parents unless it already is a directory.
///
/// # Errors
///
/// * [`FileSystemError::CreateDir`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    fs::create_dir_all(path).map_err(|source| {
        FileSystemError::CreateDir {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Replaces the file at `path` with `data` so readers never observe a partial file.
///
/// The content goes to a temporary file in the destination directory, which is then renamed
/// over `path`. Missing parent directories are created. The result is mode `0644` on unix.
///
/// # Errors
///
/// * [`FileSystemError::NoParent`] if `path` has no parent directory.
/// * [`FileSystemError::CreateDir`] if the parent directory could not be created.
/// * [`FileSystemError::Write`] naming the [`WriteStep`] that failed.
///
/// # Example
///
/// ```no_run
/// use stash_utils::fs::write_atomic;
///
/// write_atomic("/srv/npm/registry.npmjs.org/react/metadata.json", b"{}").unwrap();
/// ```
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> FileSystemResult<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            FileSystemError::NoParent {
                path: path.to_path_buf(),
            }
        })?;
    ensure_dir_exists(dir)?;

    let failed = |step: WriteStep| {
        move |source: std::io::Error| {
            FileSystemError::Write {
                path: path.to_path_buf(),
                step,
                source,
            }
        }
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(failed(WriteStep::CreateTemp))?;
    tmp.write_all(data).map_err(failed(WriteStep::Write))?;
    tmp.as_file().sync_all().map_err(failed(WriteStep::Sync))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(failed(WriteStep::SetPermissions))?;
    }

    tmp.persist(path)
        .map_err(|err| failed(WriteStep::Rename)(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let new_dir = dir.path().join("new_dir");
        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_exists_already_exists() {
        let dir = tempdir().unwrap();
        ensure_dir_exists(dir.path()).unwrap();
        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_ensure_dir_exists_file_collision() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "hello").unwrap();
        assert!(matches!(
            ensure_dir_exists(&file_path),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a").join("b").join("metadata.json");
        write_atomic(&file_path, b"{}").unwrap();
        assert_eq!(fs::read(&file_path).unwrap(), b"{}");
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("metadata.json");
        fs::write(&file_path, "old content that is longer").unwrap();
        write_atomic(&file_path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new");

        // no temporary files left behind
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("pkg-1.0.0.tgz");
        write_atomic(&file_path, b"data").unwrap();
        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_write_atomic_into_file_parent() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("react");
        fs::write(&blocker, "not a directory").unwrap();
        assert!(matches!(
            write_atomic(blocker.join("metadata.json"), b"{}"),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_write_atomic_without_parent() {
        assert!(matches!(
            write_atomic("metadata.json", b"{}"),
            Err(FileSystemError::NoParent { .. })
        ));
    }
}
