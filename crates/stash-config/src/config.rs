use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, RwLock},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use stash_utils::path::{resolve_path, xdg_config_home};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_INDEX_WORKERS: usize = 5;

/// Application's configuration
///
/// Every field is optional in the file; [`Config::resolve`] fills in defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Remote registry used for proxied requests. Either a bare host or a URL.
    /// Default: https://registry.npmjs.org
    pub registry: Option<String>,

    /// Root directory of the tarball tree.
    pub storage_path: Option<String>,

    /// Root directory of the metadata tree.
    /// Default: same as `storage_path`
    pub metadata_path: Option<String>,

    /// Fetch and store missing artifacts from the remote registry.
    /// Default: false
    pub proxystash: Option<bool>,

    /// After a proxied metadata request, download every tarball not yet stored.
    /// Only has an effect together with `proxystash`.
    /// Default: false
    pub fetch_all: Option<bool>,

    /// Template used to rewrite `dist.tarball` URLs in served metadata.
    /// Placeholders: {registry}, {scope}, {name}, {filename}
    pub url_template: Option<String>,

    /// Address the HTTP server listens on.
    /// Default: 0.0.0.0:8080
    pub addr: Option<String>,

    /// Number of packages indexed concurrently by `index-all`.
    /// Default: 5
    pub index_workers: Option<usize>,

    /// User agent sent to the remote registry.
    pub user_agent: Option<String>,

    /// Timeout in seconds for requests to the remote registry.
    pub timeout: Option<u64>,
}

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("STASH_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("stash").join("config.toml"),
    })
});

impl Config {
    pub fn default_config() -> Self {
        Self {
            registry: Some(DEFAULT_REGISTRY.to_string()),
            storage_path: None,
            metadata_path: None,
            proxystash: Some(false),
            fetch_all: Some(false),
            url_template: None,
            addr: Some(DEFAULT_ADDR.to_string()),
            index_workers: Some(DEFAULT_INDEX_WORKERS),
            user_agent: None,
            timeout: None,
        }
    }

    /// Loads the configuration from the path in [`CONFIG_PATH`].
    pub fn new() -> Result<Self> {
        let config_path = CONFIG_PATH.read().unwrap().to_path_buf();
        Self::load(config_path)
    }

    /// Loads the configuration from `path`, falling back to the defaults when the file does
    /// not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        let registry = self.registry.get_or_insert_with(|| DEFAULT_REGISTRY.to_string());
        let trimmed = registry.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidRegistry(registry.clone()));
        }
        *registry = trimmed.trim_end_matches('/').to_string();

        if self.index_workers == Some(0) {
            return Err(ConfigError::InvalidWorkerCount);
        }

        self.index_workers.get_or_insert(DEFAULT_INDEX_WORKERS);
        self.addr.get_or_insert_with(|| DEFAULT_ADDR.to_string());
        self.proxystash.get_or_insert(false);
        self.fetch_all.get_or_insert(false);

        if self.fetch_all() && !self.proxystash() {
            info!("fetch_all has no effect without proxystash");
        }

        Ok(())
    }

    pub fn registry(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    pub fn proxystash(&self) -> bool {
        self.proxystash.unwrap_or(false)
    }

    pub fn fetch_all(&self) -> bool {
        self.fetch_all.unwrap_or(false)
    }

    pub fn addr(&self) -> &str {
        self.addr.as_deref().unwrap_or(DEFAULT_ADDR)
    }

    pub fn index_workers(&self) -> usize {
        self.index_workers.unwrap_or(DEFAULT_INDEX_WORKERS)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn get_storage_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("STASH_STORAGE") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.storage_path {
            Some(path) => Ok(resolve_path(path)?),
            None => Err(ConfigError::MissingStoragePath),
        }
    }

    /// Metadata lives next to the tarballs unless a separate tree is configured.
    pub fn get_metadata_path(&self) -> Result<PathBuf> {
        match &self.metadata_path {
            Some(path) => Ok(resolve_path(path)?),
            None => self.get_storage_path(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serialized)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Writes the default configuration to [`CONFIG_PATH`], refusing to overwrite an existing file.
pub fn generate_default_config() -> Result<PathBuf> {
    let config_path = CONFIG_PATH.read().unwrap().to_path_buf();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(
            config_path.display().to_string(),
        ));
    }

    Config::default_config().save(&config_path)?;
    Ok(config_path)
}
