//! Error types for stash-core.

use miette::Diagnostic;
use stash_config::error::ConfigError;
use stash_dl::OriginError;
use stash_utils::error::FileSystemError;
use thiserror::Error;

/// Core error type for mirror and indexing operations.
#[derive(Error, Diagnostic, Debug)]
pub enum StashError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}: not found")]
    #[diagnostic(code(stash::not_found))]
    NotFound(String),

    #[error("Parse error: {0}")]
    #[diagnostic(
        code(stash::parse),
        help("Expected registry/[scope/]name coordinates and gzipped npm tarballs")
    )]
    Parse(String),

    #[error("Error while {action}")]
    #[diagnostic(code(stash::store), help("Check file permissions and disk space"))]
    Store {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(stash::fs), help("Check file permissions and disk space"))]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Origin(OriginError),

    #[error("Indexing already in progress for {0}")]
    #[diagnostic(code(stash::in_progress), help("Try again once the running index finishes"))]
    AlreadyInProgress(String),

    #[error(transparent)]
    #[diagnostic(code(stash::json))]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    #[diagnostic(code(stash::error))]
    Custom(String),
}

impl StashError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::AlreadyInProgress(_))
    }
}

impl From<OriginError> for StashError {
    fn from(err: OriginError) -> Self {
        match err {
            OriginError::NotFound { url } => Self::NotFound(url),
            other => Self::Origin(other),
        }
    }
}

pub type StashResult<T> = std::result::Result<T, StashError>;

/// Trait for adding context to IO errors.
///
/// A missing file becomes [`StashError::NotFound`]; anything else becomes
/// [`StashError::Store`].
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> StashResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> StashResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StashError::NotFound(context())
            } else {
                StashError::Store {
                    action: context(),
                    source: err,
                }
            }
        })
    }
}
