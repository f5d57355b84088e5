use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum OriginError {
    #[error("Not found at origin: {url}")]
    #[diagnostic(code(stash_dl::not_found))]
    NotFound { url: String },

    #[error("HTTP {status}: {url}")]
    #[diagnostic(
        code(stash_dl::http_error),
        help("The remote registry answered with an unexpected status")
    )]
    Status { status: u16, url: String },

    #[error(transparent)]
    #[diagnostic(
        code(stash_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error(transparent)]
    #[diagnostic(code(stash_dl::io))]
    Io(#[from] std::io::Error),
}

impl OriginError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, OriginError>;

impl From<ureq::Error> for OriginError {
    /// Converts a `ureq::Error` into an `OriginError::Network` variant.
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}
