use clap::{ArgAction, Parser, Subcommand, ValueHint};
use stash_config::config::Config;

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Directory holding the cached tarballs
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub storage: Option<String>,

    /// Directory holding package metadata (defaults to the storage directory)
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub metadir: Option<String>,

    /// Remote registry used for proxied requests
    #[arg(long, global = true)]
    pub registry: Option<String>,

    /// Fetch and store artifacts missing from the local storage
    #[arg(long, global = true)]
    pub proxystash: bool,

    /// Download every version of a package after proxying its metadata
    #[arg(long, global = true)]
    pub fetch_all: bool,

    /// Template for tarball URLs in served metadata, e.g. http://localhost:8080/{scope}/{name}/-/{filename}
    #[arg(long, global = true)]
    pub url_template: Option<String>,

    /// Set user agent for requests to the remote registry
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

impl Args {
    /// Applies the command line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(storage) = &self.storage {
            config.storage_path = Some(storage.clone());
        }
        if let Some(metadir) = &self.metadir {
            config.metadata_path = Some(metadir.clone());
        }
        if let Some(registry) = &self.registry {
            config.registry = Some(registry.clone());
        }
        if self.proxystash {
            config.proxystash = Some(true);
        }
        if self.fetch_all {
            config.fetch_all = Some(true);
        }
        if let Some(template) = &self.url_template {
            config.url_template = Some(template.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = Some(user_agent.clone());
        }
        if let Commands::Serve {
            addr: Some(addr),
        } = &self.command
        {
            config.addr = Some(addr.clone());
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the registry over HTTP
    #[clap(name = "serve", visible_alias = "s")]
    Serve {
        /// Address to listen on
        #[arg(required = false, long, short)]
        addr: Option<String>,
    },

    /// Rebuild the metadata of a single package
    #[command(arg_required_else_help = true)]
    #[clap(name = "index")]
    Index {
        /// Package to index, as registry/[scope/]name
        #[arg(required = true)]
        package: String,
    },

    /// Rebuild the metadata of every package in the storage
    #[clap(name = "index-all")]
    IndexAll {
        /// Number of packages indexed concurrently
        #[arg(required = false, long, short)]
        workers: Option<usize>,

        /// Show a progress indicator
        #[arg(required = false, long)]
        progress: bool,
    },

    /// Generate a default config file
    #[clap(name = "def-config", visible_alias = "defconfig")]
    DefConfig,
}
