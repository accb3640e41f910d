use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vaani::app::Overrides;
use vaani::cli::{Cli, Commands, ConfigAction, log_level};
use vaani::config::Config;
use vaani::output::ConsoleEcho;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Config { action }) => handle_config_command(action, cli.config.as_deref()),
        None => {
            let config = load_config(cli.config.as_deref())?;
            let config = Overrides {
                device: cli.device,
                llm_model: cli.model,
                stt_model: cli.stt_model,
            }
            .apply(config);
            run_assistant(config, cli.quiet).await
        }
    }
}

async fn run_assistant(config: Config, quiet: bool) -> Result<()> {
    tracing::info!(version = %vaani::version_string(), "starting");
    let echo = Arc::new(ConsoleEcho::stdout(quiet));

    // Model load, device open and the spoken announcement all block
    let started = tokio::task::spawn_blocking(move || vaani::app::run(config, echo)).await?;
    let handle = match started {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            return Err(e.into());
        }
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    tokio::task::spawn_blocking(move || handle.stop()).await?;
    Ok(())
}

/// Load config from the given path or the default location.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        // An explicit path must exist
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

fn handle_config_command(action: ConfigAction, path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Path => {
            let path = path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(path)?;
            print!("{}", config.to_toml()?);
            if let Err(e) = config.validate() {
                eprintln!("{}", format!("Warning: {}", e).yellow());
            }
        }
    }
    Ok(())
}
