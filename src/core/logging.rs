//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup banner with the resolved configuration

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config::AppConfig;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Minimum level for both sinks
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &Path, level: LevelFilter) -> Result<()> {
    let log_file = File::create(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to create log file {}: {}", log_file_path.display(), e))?;

    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("tower_http")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the resolved configuration at application startup
pub fn log_startup_configuration(config: &AppConfig) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("mediadrop {}", env!("CARGO_PKG_VERSION"));
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Listening on:     http://{}", config.bind_addr);
    log::info!("Download folder:  {}", config.download_dir.display());
    log::info!("Allowed origin:   {}", config.frontend_origin);
    log::info!("Downloader:       {}", config.ytdl_bin);
    log::info!(
        "Timeouts:         batch {}s, stream {}s, metadata {}s",
        config.download_timeout.as_secs(),
        config.stream_timeout.as_secs(),
        config.metadata_timeout.as_secs()
    );
    match config.retention {
        Some(age) => log::info!("File retention:   {}h", age.as_secs() / 3600),
        None => log::info!("File retention:   disabled"),
    }
}
