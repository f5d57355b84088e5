use std::{env, sync::Arc};

use clap::Parser;
use cli::{Args, Commands};
use index::{index_all, index_one};
use logging::setup_logging;
use progress::{spawn_event_handler, ProgressGuard};
use stash_config::{
    config::{generate_default_config, Config, CONFIG_PATH},
    error::ConfigError,
};
use stash_core::{ErrorContext, StashError, StashResult};
use stash_events::{ChannelSink, EventSinkHandle, NullSink};
use stash_operations::StashContext;
use stash_utils::path::resolve_path;
use tracing::{debug, info};

mod cli;
mod index;
mod logging;
mod progress;
mod rewrite;
mod server;
mod utils;

fn set_config_path(args: &Args) -> StashResult<()> {
    if let Some(ref c) = args.config {
        let path = resolve_path(c).map_err(ConfigError::from)?;
        let path = if path.is_absolute() {
            path
        } else {
            env::current_dir()
                .with_context(|| "retrieving current directory".into())?
                .join(path)
        };
        *CONFIG_PATH.write().unwrap_or_else(|e| e.into_inner()) = path;
    }
    Ok(())
}

fn load_config(args: &Args) -> StashResult<Config> {
    let mut config = Config::new()?;
    args.apply_overrides(&mut config);
    config.resolve()?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

fn create_context(config: Config, progress: bool) -> StashResult<(StashContext, Option<ProgressGuard>)> {
    if progress {
        let (sink, receiver) = ChannelSink::new();
        let events: EventSinkHandle = Arc::new(sink);
        let ctx = StashContext::from_config(config, events)?;
        Ok((ctx, Some(spawn_event_handler(receiver))))
    } else {
        let events: EventSinkHandle = Arc::new(NullSink);
        Ok((StashContext::from_config(config, events)?, None))
    }
}

async fn handle_cli() -> StashResult<()> {
    let args = Args::parse();

    setup_logging(&args);
    if args.no_color {
        utils::set_color(false);
    }

    set_config_path(&args)?;

    if let Commands::DefConfig = args.command {
        let path = generate_default_config()?;
        info!("Default config written to {}", path.display());
        return Ok(());
    }

    let config = load_config(&args)?;

    match args.command {
        Commands::Serve {
            ..
        } => {
            let (ctx, _) = create_context(config, false)?;
            server::serve(ctx).await?;
        }
        Commands::Index {
            package,
        } => {
            let (ctx, _) = create_context(config, false)?;
            tokio::task::spawn_blocking(move || index_one(&ctx, &package))
                .await
                .map_err(|err| StashError::Custom(format!("index task failed: {err}")))??;
        }
        Commands::IndexAll {
            workers,
            progress,
        } => {
            let (ctx, progress_guard) = create_context(config, progress)?;
            let result = tokio::task::spawn_blocking(move || index_all(&ctx, workers))
                .await
                .map_err(|err| StashError::Custom(format!("index task failed: {err}")))?;

            // The context owned the event sender; with it dropped the handler drains and exits.
            if let Some(guard) = progress_guard {
                guard.finish();
            }
            result?;
        }
        Commands::DefConfig => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
