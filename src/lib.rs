//! mediadrop - local HTTP front end for yt-dlp
//!
//! Accepts a media URL, runs the external downloader against a local
//! download folder and reports back, either as one JSON response or as a
//! live Server-Sent Events progress stream. Downloaded files are listed and
//! served from the same folder.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, validation and process execution
//! - `download`: format selection, yt-dlp invocation, progress relay and the
//!   download folder
//! - `server`: axum routes
//! - `cli`: command-line interface

pub mod cli;
pub mod core;
pub mod download;
pub mod server;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppConfig, AppError, AppResult};
pub use crate::server::{create_router, start_web_server};
