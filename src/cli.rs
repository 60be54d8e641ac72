use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::core::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "mediadrop")]
#[command(author, version, about = "Local HTTP front end for yt-dlp downloads", long_about = None)]
pub struct Cli {
    /// Folder downloads are written to and served from (overrides DOWNLOAD_FOLDER)
    #[arg(long, global = true)]
    pub download_dir: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides LOG_LEVEL)
    #[arg(long, global = true, value_parser = parse_level)]
    pub log_level: Option<log::LevelFilter>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides BIND_ADDR)
        #[arg(long)]
        bind: Option<IpAddr>,

        /// Origin allowed by CORS (overrides FRONTEND_ORIGIN)
        #[arg(long)]
        origin: Option<String>,
    },

    /// Check that the downloader binary runs and print its version
    Check,

    /// Delete downloaded files older than the given age
    Cleanup {
        /// Maximum file age in hours
        #[arg(long)]
        max_age_hours: u64,
    },

    /// Print the download folder listing as JSON
    List,
}

fn parse_level(value: &str) -> Result<log::LevelFilter, String> {
    value.parse().map_err(|_| format!("unknown log level '{}'", value))
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to run; `serve` with no overrides when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve {
            port: None,
            bind: None,
            origin: None,
        })
    }

    /// Layer command-line flags over an environment-derived config.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.download_dir {
            config.download_dir = dir.clone();
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(Commands::Serve { port, bind, origin }) = &self.command {
            let ip = bind.unwrap_or(config.bind_addr.ip());
            let port = port.unwrap_or(config.bind_addr.port());
            config.bind_addr = SocketAddr::new(ip, port);
            if let Some(origin) = origin {
                config.frontend_origin = origin.clone();
            }
        }
    }
}
