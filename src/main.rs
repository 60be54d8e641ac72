use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use mediadrop::cli::{Cli, Commands};
use mediadrop::core::logging::{init_logger, log_startup_configuration};
use mediadrop::core::AppConfig;
use mediadrop::download::files::{cleanup_old_files, list_files, start_cleanup_task};
use mediadrop::download::ytdlp::probe_version;
use mediadrop::server::start_web_server;

/// Main entry point
///
/// Builds the configuration (defaults → `.env` → environment → flags),
/// initialises logging and dispatches to the subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    cli.apply_to(&mut config);

    let command = cli.command();

    // Only the server talks on the terminal at info level; the one-shot
    // commands print their result on stdout.
    let level = match command {
        Commands::Serve { .. } => config.log_level,
        _ => config.log_level.min(log::LevelFilter::Warn),
    };
    init_logger(&config.log_file, level)?;

    config
        .ensure_download_dir()
        .with_context(|| format!("Cannot create download folder {}", config.download_dir.display()))?;

    match command {
        Commands::Serve { .. } => run_server(config).await,
        Commands::Check => {
            let version = probe_version(&config.ytdl_bin, config.metadata_timeout)
                .await
                .with_context(|| format!("{} is not usable", config.ytdl_bin))?;
            println!("{} {}", config.ytdl_bin, version);
            Ok(())
        }
        Commands::Cleanup { max_age_hours } => {
            let max_age = Duration::from_secs(max_age_hours.saturating_mul(3600));
            let removed = cleanup_old_files(&config.download_dir, max_age).await?;
            println!("Removed {} file(s) from {}", removed, config.download_dir.display());
            Ok(())
        }
        Commands::List => {
            let files = list_files(&config.download_dir).await?;
            println!("{}", serde_json::to_string_pretty(&files)?);
            Ok(())
        }
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    log_startup_configuration(&config);

    match probe_version(&config.ytdl_bin, config.metadata_timeout).await {
        Ok(version) => log::info!("Downloader:       {} {}", config.ytdl_bin, version),
        Err(e) => log::warn!("⚠️ {} is not usable ({}); downloads will fail", config.ytdl_bin, e),
    }

    let shutdown = CancellationToken::new();

    let cleanup_handle = config
        .retention
        .map(|max_age| start_cleanup_task(config.download_dir.clone(), max_age, shutdown.clone()));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Shutdown signal received");
                signal_token.cancel();
            }
            Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let result = start_web_server(Arc::new(config), shutdown.clone()).await;

    shutdown.cancel();
    if let Some(handle) = cleanup_handle {
        let _ = handle.await;
    }

    result
}
