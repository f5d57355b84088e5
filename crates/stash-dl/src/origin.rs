use tracing::{debug, trace};

use crate::{
    error::{OriginError, Result},
    http_client::SHARED_AGENT,
};

/// Retrieves raw bytes from the upstream registry.
pub trait Fetch: Send + Sync {
    /// Returns the full response body for `url`.
    ///
    /// # Errors
    ///
    /// * [`OriginError::NotFound`] if the registry answers 404
    /// * [`OriginError::Status`] for any other non-2xx status
    /// * [`OriginError::Network`] if the request could not be completed
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`Fetch`] implementation backed by the shared HTTP agent.
#[derive(Clone, Debug, Default)]
pub struct HttpOrigin;

impl HttpOrigin {
    pub fn new() -> Self {
        Self
    }
}

impl Fetch for HttpOrigin {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        trace!(url, "requesting from origin");
        let mut response = SHARED_AGENT.get(url).call()?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Err(OriginError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(OriginError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Packuments of popular packages are tens of megabytes, so no body limit applies.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()?;

        debug!(url, bytes = body.len(), "fetched from origin");
        Ok(body)
    }
}
