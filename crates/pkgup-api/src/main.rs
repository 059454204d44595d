//! # pkgup: Binary Entry Point
//!
//! Parses configuration, prepares the repository, and serves it over HTTP.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pkgup_api::config::{Config, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize structured tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    let state = pkgup_api::bootstrap::bootstrap(&config).map_err(|e| {
        tracing::error!("Bootstrap failed: {e}");
        e
    })?;

    if let Some(addr) = config.metrics_listen {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener {addr}"))?;
        let app = pkgup_api::metrics_app(state.metrics.clone());
        tracing::info!("metrics listening on {addr}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("metrics server failed: {e}");
            }
        });
    }

    let app = pkgup_api::app(state);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!("starting server at {}", config.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
