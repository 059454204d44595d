//! # Server Configuration
//!
//! Command-line flags, each overridable through a `PKGUP_*` environment
//! variable.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Default HTTP listen address.
pub const DEFAULT_LISTEN: &str = "127.8.5.45:8545";

/// Upload server for a pacman binary package repository.
///
/// Accepts packages over HTTP PUT, adds them to the repository database with
/// repo-add, and serves the repository over GET.
#[derive(Parser, Debug, Clone)]
#[command(name = "pkgup", version, about)]
pub struct Config {
    /// Path to repo-add. Looked up on PATH if it has no directory part.
    #[arg(long = "repo-add", env = "PKGUP_REPO_ADD", default_value = "repo-add")]
    pub repo_add: PathBuf,

    /// HTTP listen address.
    #[arg(long, env = "PKGUP_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Repository database path. Its directory holds every package.
    #[arg(long, env = "PKGUP_DB")]
    pub db: PathBuf,

    /// Serve Prometheus metrics at /metrics on this address.
    #[arg(long, env = "PKGUP_METRICS_LISTEN")]
    pub metrics_listen: Option<SocketAddr>,

    /// Log output format.
    #[arg(long, env = "PKGUP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log line format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}
