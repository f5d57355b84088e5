use miette::Diagnostic;
use stash_utils::error::PathError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(stash_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(stash_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists: {0}")]
    #[diagnostic(
        code(stash_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists(String),

    #[error("No storage path configured")]
    #[diagnostic(
        code(stash_config::missing_storage),
        help("Set `storage_path` in the config file or pass --storage <DIR>")
    )]
    MissingStoragePath,

    #[error("Invalid registry: {0}")]
    #[diagnostic(
        code(stash_config::invalid_registry),
        help("Use a host (registry.npmjs.org) or URL (https://registry.npmjs.org)")
    )]
    InvalidRegistry(String),

    #[error("index_workers must be at least 1")]
    #[diagnostic(code(stash_config::invalid_workers))]
    InvalidWorkerCount,

    #[error("IO error: {0}")]
    #[diagnostic(code(stash_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(stash_config::path))]
    Path(#[from] PathError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
