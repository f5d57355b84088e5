use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Failure to turn a configured path string into a filesystem path.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("cannot determine the current directory: {source}")]
    CurrentDir {
        #[source]
        source: io::Error,
    },

    #[error("environment variable `{var}` is not set (in `{input}`)")]
    MissingEnvVar { var: String, input: String },

    #[error("unclosed variable expression `{input}`")]
    UnclosedVariable { input: String },
}

/// Step of an atomic write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    CreateTemp,
    Write,
    Sync,
    SetPermissions,
    Rename,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            WriteStep::CreateTemp => "create a temporary file for",
            WriteStep::Write => "write",
            WriteStep::Sync => "sync",
            WriteStep::SetPermissions => "set permissions on",
            WriteStep::Rename => "move into place",
        };
        f.write_str(step)
    }
}

/// Failure while placing a file into the store.
#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("cannot create directory `{}`: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{}` exists and is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("`{}` has no parent directory", path.display())]
    NoParent { path: PathBuf },

    #[error("cannot {step} `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        step: WriteStep,
        #[source]
        source: io::Error,
    },
}

pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type PathResult<T> = std::result::Result<T, PathError>;
