use std::{
    sync::{Arc, LazyLock, RwLock},
    time::Duration,
};

use ureq::{
    http::{self, Uri},
    typestate::WithoutBody,
    Agent, RequestBuilder,
};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    /// Creates a default ClientConfig with a user agent of "stash" and no timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use stash_dl::http_client::ClientConfig;
    ///
    /// let cfg = ClientConfig::default();
    /// assert_eq!(cfg.user_agent.as_deref(), Some("stash"));
    /// assert!(cfg.timeout.is_none());
    /// ```
    fn default() -> Self {
        Self {
            user_agent: Some("stash".into()),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Builds an HTTP `Agent` configured from this `ClientConfig`.
    ///
    /// Non-2xx statuses are returned as responses rather than errors so callers can tell a
    /// missing package apart from a failing registry.
    pub fn build(&self) -> Agent {
        let mut config = ureq::Agent::config_builder()
            .timeout_global(self.timeout)
            .http_status_as_error(false);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

struct SharedClient {
    agent: Agent,
    config: ClientConfig,
}

static SHARED_CLIENT_STATE: LazyLock<Arc<RwLock<SharedClient>>> = LazyLock::new(|| {
    let config = ClientConfig::default();
    let agent = config.build();

    Arc::new(RwLock::new(SharedClient {
        agent,
        config,
    }))
});

#[derive(Clone, Default)]
pub struct SharedAgent;

impl SharedAgent {
    pub fn new() -> Self {
        Self
    }

    /// Create a GET request builder for the given URI using the shared agent.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stash_dl::http_client::SHARED_AGENT;
    ///
    /// let response = SHARED_AGENT.get("https://registry.npmjs.org/react").call();
    /// ```
    pub fn get<T>(&self, uri: T) -> RequestBuilder<WithoutBody>
    where
        Uri: TryFrom<T>,
        <Uri as TryFrom<T>>::Error: Into<http::Error>,
    {
        SHARED_CLIENT_STATE.read().unwrap().agent.get(uri)
    }
}

pub static SHARED_AGENT: LazyLock<SharedAgent> = LazyLock::new(SharedAgent::new);

/// Updates the global shared HTTP client configuration and rebuilds the shared Agent.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stash_dl::http_client::configure_http_client;
///
/// configure_http_client(|cfg| {
///     cfg.user_agent = Some("stash-mirror/1.0".to_string());
///     cfg.timeout = Some(Duration::from_secs(30));
/// });
/// ```
pub fn configure_http_client<F>(updater: F)
where
    F: FnOnce(&mut ClientConfig),
{
    let mut state = SHARED_CLIENT_STATE.write().unwrap();
    let mut new_config = state.config.clone();
    updater(&mut new_config);
    let new_agent = new_config.build();
    state.agent = new_agent;
    state.config = new_config;
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent, Some("stash".to_string()));
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_build_keeps_error_statuses_as_responses() {
        let config = ClientConfig {
            user_agent: Some("test-agent".to_string()),
            timeout: Some(Duration::from_secs(30)),
        };
        let agent = config.build();
        assert!(!agent.config().http_status_as_error());
        assert_eq!(
            agent.config().timeouts().global,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    #[serial]
    fn test_configure_http_client() {
        configure_http_client(|cfg| {
            cfg.user_agent = Some("custom-agent/1.0".to_string());
            cfg.timeout = Some(Duration::from_secs(10));
        });

        let state = SHARED_CLIENT_STATE.read().unwrap();
        assert_eq!(state.config.user_agent.as_deref(), Some("custom-agent/1.0"));
        assert_eq!(state.config.timeout, Some(Duration::from_secs(10)));
        assert_eq!(
            state.agent.config().timeouts().global,
            Some(Duration::from_secs(10))
        );
    }
}
