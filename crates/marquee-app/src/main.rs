mod cli;
mod dashboard;
mod host;

use std::sync::Arc;

use marquee_common::MarqueeError;
use marquee_config::MarqueeConfig;
use marquee_state::{FileStorage, MemoryStorage, StateManager, Storage};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

/// Config from `--config` or the default location; defaults on failure.
/// The error is returned alongside so it can be logged once logging is up.
fn load_config(args: &Args) -> (MarqueeConfig, Option<String>) {
    let loaded = match &args.config {
        Some(path) => marquee_config::load_config_from(path),
        None => marquee_config::load_config(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (MarqueeConfig::default(), Some(e.to_string())),
    }
}

fn init_logging(args: &Args, config: &MarqueeConfig) {
    let fallback = format!("marquee={}", config.logging.level);
    let directive = args.log_level.clone().unwrap_or(fallback);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                directive
                    .parse()
                    .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
            ),
        )
        .init();
}

fn open_state(config: &MarqueeConfig, ephemeral: bool) -> Result<Arc<StateManager>, MarqueeError> {
    let storage: Arc<dyn Storage> = match config.storage.resolved_path() {
        Some(path) if !ephemeral => {
            info!(path = %path.display(), "Using state file");
            Arc::new(FileStorage::new(path))
        }
        Some(_) => {
            info!("Keeping state in memory");
            Arc::new(MemoryStorage::new())
        }
        None => {
            warn!("No data directory available, keeping state in memory");
            Arc::new(MemoryStorage::new())
        }
    };

    let state = Arc::new(StateManager::new(storage)?);
    dashboard::register(&state)?;
    Ok(state)
}

async fn run(args: Args, config: MarqueeConfig) -> Result<(), MarqueeError> {
    match args.command {
        Command::Serve { bind, ephemeral } => {
            let state = open_state(&config, ephemeral)?;
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            host::serve(&config, state, &bind).await
        }
        Command::Recover => {
            let state = open_state(&config, false)?;
            let snapshot = serde_json::to_string_pretty(&state.recover())
                .map_err(|e| MarqueeError::Other(e.to_string()))?;
            println!("{snapshot}");
            Ok(())
        }
        Command::Modes => {
            let state = open_state(&config, false)?;
            let active = dashboard::active_mode(&state);
            for line in dashboard::describe(&dashboard::modes(&state), &active) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Reset => {
            let state = open_state(&config, false)?;
            state.clear()?;
            println!("Marquee state cleared");
            Ok(())
        }
        Command::Config { write } => {
            println!("{}", marquee_config::config_to_json(&config));
            if write {
                match &args.config {
                    Some(path) => marquee_config::save_config_to_path(&config, path)?,
                    None => marquee_config::save_config(&config)?,
                }
                info!("Config written");
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let args = cli::parse();
    let (config, config_error) = load_config(&args);
    init_logging(&args, &config);

    info!("Marquee v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        warn!("Config load failed, using defaults: {e}");
    }

    if let Err(e) = run(args, config).await {
        error!(error = %e, "Marquee exited with an error");
        std::process::exit(1);
    }
}
