//! # TRMNL Fruit Server Entry Point
//!
//! This binary wires configuration, logging, the data provider and the
//! renderer together and serves them over HTTP. It supports both production
//! mode (HTTP server) and development mode (render one bitmap to a file).
//!
//! Usage:
//!   trmnl-fruit [--config <path>] [--render <out.bmp>]

// Test modules
#[cfg(test)]
mod tests;

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trmnl_fruit_lib::{
    config::Config,
    fruit_data::{DataProvider, HttpItemSource},
    renderer::DisplayRenderer,
    server::{build_router, AppState},
};

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    render: Option<PathBuf>,
}

/// Parse `--config <path>` and `--render <path>`; unknown arguments are ignored.
fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Args {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = args.next().map(PathBuf::from),
            "--render" => parsed.render = args.next().map(PathBuf::from),
            _ => {}
        }
    }
    parsed
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trmnl_fruit=info,trmnl_fruit_lib=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args(env::args().skip(1));
    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    config.validate().context("invalid configuration")?;

    let source = HttpItemSource::new(
        config.source.url.clone(),
        Duration::from_secs(config.source.timeout_seconds),
    )
    .context("failed to build HTTP client")?;
    let provider = DataProvider::new(
        Box::new(source),
        Duration::from_secs(config.cache.ttl_seconds),
    );
    let renderer = DisplayRenderer::from_config(&config);

    // Development mode: one bitmap to disk
    if let Some(out) = &args.render {
        let bytes = match provider.get_snapshot().await {
            Ok(snapshot) => renderer.render(&snapshot).unwrap_or_else(|e| {
                warn!(error = %e, "render failed, writing error bitmap");
                renderer.render_error(&e.to_string())
            }),
            Err(e) => {
                warn!(error = %e, "fetch failed, writing error bitmap");
                renderer.render_error(&e.to_string())
            }
        };
        std::fs::write(out, &bytes).with_context(|| format!("writing {}", out.display()))?;
        info!(path = %out.display(), bytes = bytes.len(), "bitmap written");
        return Ok(());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    info!(
        "Starting TRMNL Fruit v{} on {} ({}x{}, refresh {}s)",
        env!("CARGO_PKG_VERSION"),
        addr,
        config.display.width,
        config.display.height,
        config.refresh_seconds()
    );

    let app = build_router(Arc::new(AppState {
        provider,
        renderer,
        config,
    }));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
